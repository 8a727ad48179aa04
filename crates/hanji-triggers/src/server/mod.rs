//! HTTP server for the webhook and history endpoints
//!
//! Routes:
//! - `POST  /api/messages`           LINE webhook
//! - `GET   /api/messages`           stored history and AI mode
//! - `PATCH /api/messages/toggle-ai` set AI mode
//! - `GET   /api/messages/toggle-ai` read AI mode
//! - `GET   /health`, `GET /`        service status
//!
//! The webhook route has no request timeout. A batch is bounded by the
//! outbound client timeouts and runs in its own task, so every event of an
//! accepted batch is stored even if the caller goes away.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::handler::{HistorySnapshot, WebhookError, WebhookHandler, WebhookSummary};

/// Server configuration
#[derive(Debug, Clone)]
pub struct WebhookServerConfig {
    pub bind_addr: SocketAddr,

    /// Allow cross-origin requests (the polling page may be hosted elsewhere)
    pub enable_cors: bool,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for WebhookServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            enable_cors: true,
            timeout_secs: 30,
            max_body_size: 1024 * 1024,
        }
    }
}

/// Webhook server
pub struct WebhookServer {
    handler: Arc<WebhookHandler>,
    config: WebhookServerConfig,
}

impl WebhookServer {
    pub fn new(handler: Arc<WebhookHandler>) -> Self {
        Self::with_config(handler, WebhookServerConfig::default())
    }

    pub fn with_config(handler: Arc<WebhookHandler>, config: WebhookServerConfig) -> Self {
        Self { handler, config }
    }

    pub fn config(&self) -> &WebhookServerConfig {
        &self.config
    }

    /// Build the router with all routes and layers
    pub fn router(&self) -> Router {
        let timed: Router<Arc<WebhookHandler>> = Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/api/messages/toggle-ai", get(get_ai_status).patch(toggle_ai))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeout_secs)));

        let router = Router::new()
            .route("/api/messages", get(list_messages).post(receive_webhook))
            .merge(timed)
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .layer(TraceLayer::new_for_http())
            .with_state(self.handler.clone());

        if self.config.enable_cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Serve until the process is stopped
    pub async fn serve(self) -> std::io::Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` completes, finishing in-flight requests
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!("Webhook server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Parse(_) | WebhookError::Aborted(_) => {
                error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WebhookError::InvalidToggle(_) => {
                warn!("{}", self);
                StatusCode::BAD_REQUEST
            }
        };

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

// ============================================================================
// HTTP Handlers
// ============================================================================

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "hanji",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "LINE webhook receiver for the Hanji bot",
        "endpoints": {
            "webhook": "POST /api/messages",
            "history": "GET /api/messages",
            "toggle": "GET|PATCH /api/messages/toggle-ai",
            "health": "GET /health"
        }
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// LINE webhook handler
async fn receive_webhook(
    State(handler): State<Arc<WebhookHandler>>,
    body: Bytes,
) -> Result<Json<WebhookSummary>, WebhookError> {
    let task = tokio::spawn(async move { handler.handle_webhook(&body).await });

    match task.await {
        Ok(result) => result.map(Json),
        Err(e) => Err(WebhookError::Aborted(e.to_string())),
    }
}

async fn list_messages(State(handler): State<Arc<WebhookHandler>>) -> Json<HistorySnapshot> {
    Json(handler.history())
}

async fn get_ai_status(State(handler): State<Arc<WebhookHandler>>) -> impl IntoResponse {
    Json(json!({ "useAI": handler.use_ai() }))
}

async fn toggle_ai(
    State(handler): State<Arc<WebhookHandler>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, WebhookError> {
    let use_ai = handler.toggle_ai(&body)?;
    Ok(Json(json!({ "success": true, "useAI": use_ai })))
}
