//! HTTP dispatcher for the Sembra backend.
//!
//! `ApiClient` issues exactly one timeout-bounded request per call, attaches
//! the stored bearer token when one exists, and folds every failure mode
//! into [`ApiError`]. It never retries and never presents UI.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{StoreError, TokenStore};
use crate::config::Config;

use super::ApiError;

/// The request methods the backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Per-call request description, dropped once the response is handled.
#[derive(Debug, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    /// Extra headers, merged after the defaults so callers may override them.
    pub headers: HeaderMap,
}

/// Client for the Sembra backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    store: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// Create a client from configuration and an injected token store.
    pub fn new(config: &Config, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout: config.timeout(),
            store,
        })
    }

    /// The token store this client reads and the auth flows write.
    pub fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }

    // ===== Generic dispatch =====

    /// Issue one request and decode the response as `T`.
    ///
    /// The stored token is re-read on every call and attached as a bearer
    /// credential only when present. Non-2xx responses become
    /// [`ApiError::Http`] with a best-effort message; 204 decodes from JSON
    /// `null` so `()` result shapes work without a body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<T, ApiError> {
        let headers = self.build_headers(&opts.headers)?;
        let url = format!("{}{}", self.base_url, path);

        debug!(%url, method = ?opts.method, "Dispatching request");

        let mut request = self
            .client
            .request(opts.method.as_reqwest(), &url)
            .headers(headers)
            .timeout(self.timeout);
        if let Some(ref body) = opts.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ApiError::from_transport)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        if status == StatusCode::NO_CONTENT {
            return serde_json::from_value(Value::Null)
                .map_err(|e| ApiError::InvalidResponse(e.to_string()));
        }

        let text = response.text().await.map_err(ApiError::from_transport)?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to decode response from {url}: {e}"))
        })
    }

    /// Default headers plus caller overrides. The bearer credential is
    /// attached only when a token is actually stored - never as an empty
    /// header.
    fn build_headers(&self, extra: &HeaderMap) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // A failed read means "not logged in" for this request; read
        // failures are not user-visible.
        let token = match self.store.get_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read stored token");
                None
            }
        };
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                StoreError::InvalidToken("token contains bytes not allowed in a header".into())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        for (name, value) in extra {
            headers.insert(name, value.clone());
        }

        Ok(headers)
    }

    fn body_value<B: Serialize>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body)
            .map_err(|e| ApiError::Protocol(format!("Unserializable request body: {e}")))
    }

    // ===== Method shorthands =====

    /// GET `path`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(path, RequestOptions::default()).await
    }

    /// POST `path` with a JSON body.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(
            path,
            RequestOptions {
                method: Method::Post,
                body: Some(Self::body_value(body)?),
                ..Default::default()
            },
        )
        .await
    }

    /// PUT `path` with a JSON body.
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(
            path,
            RequestOptions {
                method: Method::Put,
                body: Some(Self::body_value(body)?),
                ..Default::default()
            },
        )
        .await
    }

    /// PATCH `path` with a JSON body.
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(
            path,
            RequestOptions {
                method: Method::Patch,
                body: Some(Self::body_value(body)?),
                ..Default::default()
            },
        )
        .await
    }

    /// DELETE `path`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(
            path,
            RequestOptions {
                method: Method::Delete,
                ..Default::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Instant;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Pong {
        ok: bool,
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn client_for(server: &MockServer, store: Arc<dyn TokenStore>) -> ApiClient {
        let config = Config {
            base_url: server.uri(),
            timeout_ms: 2_000,
            last_email: None,
        };
        ApiClient::new(&config, store).expect("build client")
    }

    #[tokio::test]
    async fn attaches_bearer_token_when_stored() {
        init_tracing();
        let server = MockServer::start().await;
        let store = Arc::new(MemoryTokenStore::new());
        store.set_token("tok-123").unwrap();

        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let client = client_for(&server, store);
        let pong: Pong = client.get("/ping").await.expect("request succeeds");
        assert!(pong.ok);
    }

    #[tokio::test]
    async fn omits_authorization_header_when_no_token() {
        let server = MockServer::start().await;

        // Mounted first, so an authorization header of any kind matches here
        // and trips the expect(0) check on drop.
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
        let pong: Pong = client.get("/ping").await.expect("request succeeds");
        assert!(pong.ok);
    }

    #[tokio::test]
    async fn caller_headers_override_defaults() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("content-type", "application/vnd.sembra+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.sembra+json"),
        );

        let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
        let pong: Pong = client
            .request(
                "/ping",
                RequestOptions {
                    headers,
                    ..Default::default()
                },
            )
            .await
            .expect("request succeeds");
        assert!(pong.ok);
    }

    #[tokio::test]
    async fn post_sends_the_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/items"))
            .and(body_json(json!({ "name": "semilla" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
        let pong: Pong = client
            .post("/items", &json!({ "name": "semilla" }))
            .await
            .expect("request succeeds");
        assert!(pong.ok);
    }

    #[tokio::test]
    async fn shorthands_fix_the_method() {
        let server = MockServer::start().await;
        let body = json!({ "ok": true });

        for verb in ["PUT", "PATCH", "DELETE"] {
            Mock::given(method(verb))
                .and(path("/resource"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
                .mount(&server)
                .await;
        }

        let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
        let _: Pong = client.put("/resource", &body).await.expect("put");
        let _: Pong = client.patch("/resource", &body).await.expect("patch");
        let _: Pong = client.delete("/resource").await.expect("delete");
    }

    #[tokio::test]
    async fn no_content_returns_without_decoding() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/resource"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
        client.delete::<()>("/resource").await.expect("delete");
    }

    #[tokio::test]
    async fn error_message_comes_from_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({ "success": false, "message": "Correo ya registrado" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
        let err = client.get::<Pong>("/ping").await.expect_err("must fail");
        match err {
            ApiError::Http { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Correo ya registrado");
            }
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn error_message_falls_back_to_raw_text() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(502).set_body_string("gateway exploded"))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
        let err = client.get::<Pong>("/ping").await.expect_err("must fail");
        match err {
            ApiError::Http { message, .. } => assert_eq!(message, "gateway exploded"),
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn error_message_falls_back_to_status_code() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
        let err = client.get::<Pong>("/ping").await.expect_err("must fail");
        match err {
            ApiError::Http { message, .. } => assert!(message.contains("500")),
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_hard_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
        let err = client.get::<Pong>("/ping").await.expect_err("must fail");
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn slow_responses_time_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": true }))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let config = Config {
            base_url: server.uri(),
            timeout_ms: 200,
            last_email: None,
        };
        let client =
            ApiClient::new(&config, Arc::new(MemoryTokenStore::new())).expect("build client");

        let started = Instant::now();
        let err = client.get::<Pong>("/ping").await.expect_err("must fail");
        assert!(matches!(err, ApiError::Timeout));
        assert!(err.is_network());
        // Configured duration plus scheduling slack, not the server's delay.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn concurrent_requests_are_independent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
        let (a, b) = futures::join!(client.get::<Pong>("/a"), client.get::<Pong>("/b"));
        assert!(a.expect("a").ok);
        assert!(b.expect("b").ok);
    }
}
