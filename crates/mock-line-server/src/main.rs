//! Mock LINE Server - stands in for the LINE and Gemini APIs during local runs
//!
//! Point the bot at this server (`spec.line.api_base` and
//! `spec.gemini.endpoint`) to exercise the whole reply path offline:
//!
//! - `POST /v2/bot/message/reply`                    LINE Reply API
//! - `POST /v1beta/models/{model}:generateContent`   Gemini API
//! - `GET  /calls`, `POST /calls/clear`              recorded calls
//! - `POST /simulate`                                build a webhook payload
//!
//! Usage:
//!   cargo run -p mock-line-server
//!   # Server starts on http://127.0.0.1:3334

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "mock-line-server", version, about)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 3334)]
    port: u16,

    /// Text returned by the mocked Gemini endpoint
    #[arg(long, default_value = "汪汪！憨吉最喜歡主人了！")]
    gemini_reply: String,
}

/// Recorded outbound call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedCall {
    pub id: String,
    pub api: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub payload: Value,
    pub headers: HashMap<String, String>,
}

/// Server state
#[derive(Clone)]
struct AppState {
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    gemini_reply: Arc<str>,
}

impl AppState {
    fn new(gemini_reply: impl Into<Arc<str>>) -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            gemini_reply: gemini_reply.into(),
        }
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        // Upstream APIs
        .route("/v2/bot/message/reply", post(line_reply))
        .route("/v1beta/models/:action", post(gemini_generate))
        // Test utilities
        .route("/calls", get(list_calls))
        .route("/calls/clear", post(clear_calls))
        .route("/simulate", post(simulate_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    info!("Mock LINE server starting on http://{}", addr);
    info!("Available endpoints:");
    info!("  POST /v2/bot/message/reply                  - LINE Reply API");
    info!("  POST /v1beta/models/{{model}}:generateContent - Gemini API");
    info!("  GET  /calls                                 - List recorded calls");
    info!("  POST /simulate                              - Build a webhook payload");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(AppState::new(args.gemini_reply))).await?;
    Ok(())
}

// ============================================================================
// HTTP Handlers
// ============================================================================

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "mock-line-server",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Mock LINE and Gemini APIs for Hanji testing",
        "endpoints": {
            "line": "/v2/bot/message/reply",
            "gemini": "/v1beta/models/{model}:generateContent",
            "calls": "/calls",
            "simulate": "/simulate"
        }
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// LINE Reply API
async fn line_reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Bearer ") && v.len() > "Bearer ".len())
        .unwrap_or(false);

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Authentication failed. Confirm that the access token in the authorization header is valid." })),
        );
    }

    record_call(&state, "line-reply", payload, &headers).await;
    (StatusCode::OK, Json(json!({})))
}

/// Gemini generateContent
async fn gemini_generate(
    State(state): State<AppState>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let model = match action.split_once(':') {
        Some((model, "generateContent")) => model.to_string(),
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": { "code": 404, "message": format!("Unknown action: {}", action) } })),
            );
        }
    };

    debug!("Gemini request for model {}", model);
    record_call(&state, "gemini", payload, &headers).await;

    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": &*state.gemini_reply }]
                },
                "finishReason": "STOP"
            }],
            "modelVersion": model
        })),
    )
}

/// List recorded calls
async fn list_calls(State(state): State<AppState>) -> impl IntoResponse {
    let calls = state.calls.read().await;
    Json(json!({
        "count": calls.len(),
        "calls": *calls
    }))
}

/// Clear recorded calls
async fn clear_calls(State(state): State<AppState>) -> impl IntoResponse {
    let mut calls = state.calls.write().await;
    let count = calls.len();
    calls.clear();

    Json(json!({ "cleared": count }))
}

/// Simulate request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateRequest {
    user_id: String,
    text: String,
    #[serde(default)]
    reply_token: Option<String>,
}

/// Build a LINE webhook payload to POST to the bot's `/api/messages`
async fn simulate_webhook(Json(req): Json<SimulateRequest>) -> impl IntoResponse {
    Json(generate_line_payload(&req))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn generate_line_payload(req: &SimulateRequest) -> Value {
    let reply_token = req
        .reply_token
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    json!({
        "destination": "Umockbot",
        "events": [{
            "type": "message",
            "message": {
                "type": "text",
                "id": uuid::Uuid::new_v4().as_u128().to_string(),
                "text": req.text
            },
            "timestamp": chrono::Utc::now().timestamp_millis(),
            "source": { "type": "user", "userId": req.user_id },
            "replyToken": reply_token,
            "mode": "active"
        }]
    })
}

async fn record_call(state: &AppState, api: &str, payload: Value, headers: &HeaderMap) {
    let mut header_map = HashMap::new();
    for (key, value) in headers.iter() {
        if let Ok(value_str) = value.to_str() {
            header_map.insert(key.to_string(), value_str.to_string());
        }
    }

    let call = RecordedCall {
        id: uuid::Uuid::new_v4().to_string(),
        api: api.to_string(),
        timestamp: chrono::Utc::now(),
        payload,
        headers: header_map,
    };

    debug!("Recording {} call", api);
    state.calls.write().await.push(call);
}
