use thiserror::Error;

use crate::auth::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("Token storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid carrying excessive data around
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Map a transport failure, separating timeouts from other errors.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err)
        }
    }

    /// Build the error for a non-2xx response from its status and raw body.
    ///
    /// Message priority: a `message` field in a JSON body (strings as-is,
    /// other values re-serialized), then the literal body text when the body
    /// is not JSON, then `HTTP <status>`.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => match value.get("message") {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => format!("HTTP {}", status.as_u16()),
                Some(other) => other.to_string(),
            },
            Err(_) if !body.is_empty() => Self::truncate_body(body),
            Err(_) => format!("HTTP {}", status.as_u16()),
        };

        ApiError::Http {
            status: status.as_u16(),
            message,
        }
    }

    /// True for failures where no usable response was obtained.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout)
    }
}
