//! Login and registration against the Sembra backend.
//!
//! Both endpoints answer with the `{ success, message }` envelope, but the
//! `message` payload is not stable across them: login nests
//! `{ token, message }` one level down, while register answers with either a
//! flat string or a nested object depending on the backend revision. The
//! [`display_message`] adapter absorbs both shapes so callers always see a
//! plain [`AuthOutcome`].

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::{ApiClient, ApiError};

use super::store::TokenStore;

/// Login endpoint path.
const LOGIN_PATH: &str = "/auth/login";

/// Registration endpoint path (the `/api` prefix lives in the base URL).
const REGISTER_PATH: &str = "/user/createUser";

/// Credentials for [`login`].
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Fields for [`register`].
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Normalized result either auth operation hands to the calling screen.
/// Presentation (toast, alert) is the screen's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub success: bool,
    pub message: String,
}

/// Backend `{ success, message }` envelope. `message` stays raw because its
/// shape differs per endpoint and backend revision.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Value,
}

/// Log in and persist the returned session token.
///
/// The store is only written when the backend reports success *and* the
/// token is present; a success without a token is a contract violation.
pub async fn login(client: &ApiClient, input: &LoginInput) -> Result<AuthOutcome, ApiError> {
    let body = json!({ "email": input.email, "password": input.password });
    let envelope: Envelope = client.post(LOGIN_PATH, &body).await?;

    if !envelope.success {
        return Ok(AuthOutcome {
            success: false,
            message: display_message(&envelope.message),
        });
    }

    let token = envelope
        .message
        .get("token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Protocol("token not received".to_string()))?;

    client.store().set_token(token)?;
    info!("Login successful");

    Ok(AuthOutcome {
        success: true,
        message: display_message(&envelope.message),
    })
}

/// Create an account.
///
/// Never touches the token store: registration does not establish a session.
pub async fn register(client: &ApiClient, input: &RegisterInput) -> Result<AuthOutcome, ApiError> {
    let body = json!({
        "name": input.name,
        "email": input.email,
        "password": input.password,
    });
    let envelope: Envelope = client.post(REGISTER_PATH, &body).await?;

    Ok(AuthOutcome {
        success: envelope.success,
        message: display_message(&envelope.message),
    })
}

/// Drop the persisted session.
pub fn logout(client: &ApiClient) -> Result<(), ApiError> {
    client.store().clear_token()?;
    info!("Session cleared");
    Ok(())
}

/// Whether a session token is currently readable. Startup probe for the
/// shell's logged-in state.
pub fn session_active(store: &dyn TokenStore) -> bool {
    matches!(store.get_token(), Ok(Some(_)))
}

/// Collapse the envelope's `message` payload into one display string:
/// flat strings as-is, `{ message: "..." }` unwrapped, anything else
/// re-serialized, null/missing empty.
fn display_message(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(s)) => s.clone(),
            _ => message.to_string(),
        },
        other => other.to_string(),
    }
}
