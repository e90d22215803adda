//! Webhook server implementation
//!
//! Provides the HTTP endpoint that receives Contentful webhooks. Every
//! request to `POST /` must carry a valid signature; anything else is
//! rejected with 403 before it reaches the downstream handler.

use super::freshness::{check_freshness, FreshnessError};
use super::request::IncomingRequest;
use crate::settings::WebhookConfig;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Body returned for every rejected request
pub const REJECTION_MESSAGE: &str = "Invalid signature";

/// Shared application state for the webhook server
#[derive(Debug, Clone)]
pub struct AppState {
    /// Webhook configuration, read-only for the lifetime of the server
    pub config: Arc<WebhookConfig>,
}

impl AppState {
    /// Create a new AppState with the given config
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// Reasons a webhook request is rejected.
///
/// Every variant produces the same 403 response; the distinction only shows
/// up in the server's own logs.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Invalid or missing signature
    #[error("invalid or missing webhook signature")]
    InvalidSignature,
    /// Signature valid, but the request is outside the replay window
    #[error("stale webhook request: {0}")]
    Stale(#[from] FreshnessError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = Json(WebhookErrorResponse {
            error: REJECTION_MESSAGE.to_string(),
        });

        (StatusCode::FORBIDDEN, body).into_response()
    }
}

/// Result type for webhook operations
pub type WebhookResult<T> = Result<T, WebhookError>;

/// Errors raised while running the server
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The server stopped with an I/O error
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookErrorResponse {
    pub error: String,
}

/// Accepted webhook response
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Create the webhook router with all routes
pub fn create_webhook_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/", post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint handler
///
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Authenticate a captured request.
///
/// Checks the signature first, then the replay window when one is
/// configured. `now_ms` is the current time in milliseconds since the epoch.
pub fn authenticate(
    config: &WebhookConfig,
    request: &IncomingRequest,
    now_ms: i64,
) -> WebhookResult<()> {
    if !request.verify_signature(&config.signing_secret) {
        return Err(WebhookError::InvalidSignature);
    }

    if let Some(max_age_seconds) = config.max_age_seconds {
        check_freshness(request, max_age_seconds, now_ms)?;
    }

    Ok(())
}

/// Webhook endpoint handler
///
/// POST /
///
/// Buffers the body once, authenticates the request, and hands the same
/// captured request to the downstream handler. Returns 403 Forbidden on any
/// authentication failure.
pub async fn webhook_handler(
    State(state): State<AppState>,
    request: Request,
) -> WebhookResult<Json<WebhookResponse>> {
    let incoming = IncomingRequest::capture(request, state.config.max_body_bytes).await;
    let now_ms = chrono::Utc::now().timestamp_millis();

    if let Err(e) = authenticate(&state.config, &incoming, now_ms) {
        tracing::warn!(
            method = %incoming.method(),
            path = %incoming.path(),
            body_len = incoming.body().len(),
            "Rejected webhook request"
        );
        tracing::debug!(reason = %e, "Rejection reason");
        return Err(e);
    }

    tracing::info!(
        method = %incoming.method(),
        path = %incoming.path(),
        body_len = incoming.body().len(),
        "Webhook request verified"
    );

    Ok(Json(handle_verified(&incoming)))
}

/// Downstream processing of a verified request.
fn handle_verified(request: &IncomingRequest) -> WebhookResponse {
    tracing::debug!(
        topic = request.header_or_empty("x-contentful-topic"),
        "Processing verified webhook"
    );

    WebhookResponse {
        message: "Hello, World!".to_string(),
    }
}

/// Bind the configured address and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: WebhookConfig) -> Result<(), ServerError> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!(
        %addr,
        replay_window = ?config.max_age_seconds,
        "Webhook gate listening"
    );

    let app = create_webhook_router(AppState::new(config));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Webhook gate stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{sign, SigningSecret};
    use crate::webhooks::request::{SIGNATURE_HEADER, SIGNED_HEADERS_HEADER, TIMESTAMP_HEADER};
    use axum::body::{Body, Bytes};
    use axum::http::{HeaderMap, HeaderValue, Method, Request};
    use tower::ServiceExt;

    const SECRET: &str = "s3cr3t";
    const PAYLOAD: &str = r#"{"a":1}"#;
    const REFERENCE_SIGNATURE: &str =
        "78fd2beb698c0d61df077ad1d45fbc9d0963302de31f349796b598ea128e2568";

    fn create_test_state() -> AppState {
        AppState::new(WebhookConfig::new(SECRET))
    }

    fn webhook_request(signature: Option<&str>, signed_headers: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header("Content-Type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("X-Contentful-Signature", signature);
        }
        if let Some(signed_headers) = signed_headers {
            builder = builder.header("X-Contentful-Signed-Headers", signed_headers);
        }
        builder.body(Body::from(PAYLOAD)).unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_webhook_router(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = body_json(response).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "webhook-gate");
    }

    #[tokio::test]
    async fn test_webhook_with_valid_signature() {
        let app = create_webhook_router(create_test_state());

        let response = app
            .oneshot(webhook_request(Some(REFERENCE_SIGNATURE), Some("Content-Type")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let result: WebhookResponse = body_json(response).await;
        assert_eq!(result.message, "Hello, World!");
    }

    #[tokio::test]
    async fn test_webhook_with_invalid_signature() {
        let app = create_webhook_router(create_test_state());

        let response = app
            .oneshot(webhook_request(
                Some("0000000000000000000000000000000000000000000000000000000000000000"),
                Some("Content-Type"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let result: WebhookErrorResponse = body_json(response).await;
        assert_eq!(result.error, "Invalid signature");
    }

    #[tokio::test]
    async fn test_webhook_missing_signature_header() {
        let app = create_webhook_router(create_test_state());

        let response = app
            .oneshot(webhook_request(None, Some("Content-Type")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_webhook_missing_signed_headers_header() {
        let app = create_webhook_router(create_test_state());

        // Valid for the reference request only when content-type is signed
        let response = app
            .oneshot(webhook_request(Some(REFERENCE_SIGNATURE), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_webhook_wrong_secret() {
        let app = create_webhook_router(AppState::new(WebhookConfig::new("another-secret")));

        let response = app
            .oneshot(webhook_request(Some(REFERENCE_SIGNATURE), Some("Content-Type")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_webhook_get_not_allowed() {
        let app = create_webhook_router(create_test_state());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_webhook_oversized_body_rejected() {
        let config = WebhookConfig::new(SECRET).with_max_body_bytes(4);
        let app = create_webhook_router(AppState::new(config));

        let response = app
            .oneshot(webhook_request(Some(REFERENCE_SIGNATURE), Some("Content-Type")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_rejection_response_hides_reason() {
        let stale = WebhookError::Stale(FreshnessError::MissingTimestamp).into_response();
        let invalid = WebhookError::InvalidSignature.into_response();
        assert_eq!(stale.status(), StatusCode::FORBIDDEN);
        assert_eq!(invalid.status(), StatusCode::FORBIDDEN);
    }

    fn timestamped_request(secret: &SigningSecret, timestamp_ms: i64) -> IncomingRequest {
        let mut headers = HeaderMap::new();
        headers.insert(
            TIMESTAMP_HEADER,
            HeaderValue::from_str(&timestamp_ms.to_string()).unwrap(),
        );
        headers.insert(
            SIGNED_HEADERS_HEADER,
            HeaderValue::from_static("x-contentful-timestamp"),
        );
        let body = Bytes::from_static(PAYLOAD.as_bytes());
        let unsigned = IncomingRequest::new(Method::POST, "/", headers.clone(), body.clone());
        let signature = sign(secret, &unsigned.canonical_string());
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).unwrap());
        IncomingRequest::new(Method::POST, "/", headers, body)
    }

    #[test]
    fn test_authenticate_without_replay_window() {
        let config = WebhookConfig::new(SECRET);
        let request = timestamped_request(&config.signing_secret, 0);
        assert!(authenticate(&config, &request, 1_700_000_000_000).is_ok());
    }

    #[test]
    fn test_authenticate_with_replay_window() {
        let config = WebhookConfig::new(SECRET).with_max_age_seconds(30);
        let now_ms = 1_700_000_000_000;

        let fresh = timestamped_request(&config.signing_secret, now_ms - 1_000);
        assert!(authenticate(&config, &fresh, now_ms).is_ok());

        let stale = timestamped_request(&config.signing_secret, now_ms - 60_000);
        assert!(matches!(
            authenticate(&config, &stale, now_ms),
            Err(WebhookError::Stale(FreshnessError::Expired { .. }))
        ));
    }

    #[test]
    fn test_authenticate_checks_signature_before_timestamp() {
        let config = WebhookConfig::new(SECRET).with_max_age_seconds(30);
        let request = timestamped_request(&SigningSecret::from("forged"), 0);
        assert!(matches!(
            authenticate(&config, &request, 1_700_000_000_000),
            Err(WebhookError::InvalidSignature)
        ));
    }

    fn timestamped_http_request(timestamp_ms: i64) -> Request<Body> {
        let signed = timestamped_request(&SigningSecret::from(SECRET), timestamp_ms);
        Request::builder()
            .method("POST")
            .uri("/")
            .header(TIMESTAMP_HEADER, timestamp_ms.to_string())
            .header(SIGNED_HEADERS_HEADER, "x-contentful-timestamp")
            .header(SIGNATURE_HEADER, signed.signature())
            .body(Body::from(PAYLOAD))
            .unwrap()
    }

    #[tokio::test]
    async fn test_webhook_fresh_timestamp_accepted() {
        let config = WebhookConfig::new(SECRET).with_max_age_seconds(300);
        let app = create_webhook_router(AppState::new(config));
        let now_ms = chrono::Utc::now().timestamp_millis();

        let response = app
            .oneshot(timestamped_http_request(now_ms - 1_000))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_stale_timestamp_rejected() {
        let config = WebhookConfig::new(SECRET).with_max_age_seconds(30);
        let app = create_webhook_router(AppState::new(config));
        let now_ms = chrono::Utc::now().timestamp_millis();

        let response = app
            .oneshot(timestamped_http_request(now_ms - 3_600_000))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let result: WebhookErrorResponse = body_json(response).await;
        assert_eq!(result.error, "Invalid signature");
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:8080".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(err.to_string(), "failed to bind 0.0.0.0:8080: in use");
    }
}
