//! Webhook Integration Tests
//!
//! Drives the full axum router with `tower::ServiceExt::oneshot` while the
//! LINE Reply API and the Gemini API are served by wiremock. These tests
//! verify that:
//! - batches are filtered, replied to and stored correctly
//! - the history and toggle endpoints expose the shared state
//! - downstream failures never prevent a message from being stored

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use hanji_core::{AiModeFlag, MessageStore};
use hanji_llm::{GoogleConfig, GoogleProvider};
use hanji_triggers::{
    CannedResponder, CannedResponseTable, LineConfig, LinePlatform, ReplyDispatcher,
    SeededRandom, WebhookHandler, WebhookServer, WebhookServerConfig,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPLY_PATH: &str = "/v2/bot/message/reply";
const GEMINI_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Build a handler whose LINE and Gemini clients point at the mock server
fn create_handler(
    server: &MockServer,
    line_token: Option<&str>,
    gemini_key: Option<&str>,
    line_timeout_secs: u64,
) -> Arc<WebhookHandler> {
    init_tracing();

    let platform = LinePlatform::new(LineConfig {
        channel_access_token: line_token.map(str::to_string),
        api_base: server.uri(),
        timeout_secs: line_timeout_secs,
    })
    .unwrap();

    let gemini = GoogleProvider::create(GoogleConfig {
        api_key: gemini_key.map(str::to_string),
        endpoint: format!("{}/v1beta", server.uri()),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap();

    let canned = CannedResponder::with_random(
        CannedResponseTable::default(),
        Box::new(SeededRandom::new(7)),
    );

    let dispatcher = ReplyDispatcher::new(
        Arc::new(platform),
        Arc::new(gemini),
        Arc::new(canned),
        Arc::new(AiModeFlag::default()),
    );
    Arc::new(WebhookHandler::new(dispatcher, Arc::new(MessageStore::new())))
}

/// Build a router wired to the given mock server
fn create_app(server: &MockServer, line_token: Option<&str>, gemini_key: Option<&str>) -> Router {
    WebhookServer::new(create_handler(server, line_token, gemini_key, 5)).router()
}

fn text_event(id: &str, text: &str, user: &str, token: Option<&str>, ts: i64) -> Value {
    json!({
        "type": "message",
        "message": { "type": "text", "id": id, "text": text },
        "timestamp": ts,
        "source": { "type": "user", "userId": user },
        "replyToken": token,
        "mode": "active"
    })
}

fn webhook_body(events: Vec<Value>) -> Value {
    json!({ "destination": "Ubot0000", "events": events })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Vec<u8>>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: &Value) -> (StatusCode, Value) {
    send(app, method, uri, Some(serde_json::to_vec(body).unwrap())).await
}

async fn mount_line_success(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .and(header("authorization", "Bearer line-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ============================================================================
// Webhook Tests
// ============================================================================

#[tokio::test]
async fn test_end_to_end_reply_and_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .and(header("authorization", "Bearer line-token"))
        .and(body_partial_json(json!({ "replyToken": "tok1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_app(&server, Some("line-token"), None);

    let body = webhook_body(vec![text_event("1", "憨吉坐下", "u1", Some("tok1"), 1000)]);
    let (status, summary) = send_json(&app, "POST", "/api/messages", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary, json!({ "success": true, "messageCount": 1 }));

    let (status, history) = send(&app, "GET", "/api/messages", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["useAI"], false);

    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "憨吉坐下");
    assert_eq!(messages[0]["userId"], "u1");
    assert_eq!(messages[0]["timestamp"], 1000);
    assert_eq!(messages[0]["type"], "text");
    let reply = messages[0]["reply"].as_str().unwrap();
    assert!(reply.starts_with("【憨吉】"));
    assert!(reply.len() > "【憨吉】".len());
}

#[tokio::test]
async fn test_message_without_persona_is_stored_without_reply() {
    let server = MockServer::start().await;
    mount_line_success(&server, 0).await;

    let app = create_app(&server, Some("line-token"), None);

    let body = webhook_body(vec![text_event("1", "今天吃什麼", "u1", Some("tok1"), 1)]);
    let (status, summary) = send_json(&app, "POST", "/api/messages", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["messageCount"], 1);

    let (_, history) = send(&app, "GET", "/api/messages", None).await;
    let message = &history["messages"][0];
    assert_eq!(message["text"], "今天吃什麼");
    assert!(message.get("reply").is_none());
}

#[tokio::test]
async fn test_batch_counts_only_text_messages() {
    let server = MockServer::start().await;
    mount_line_success(&server, 2).await;

    let app = create_app(&server, Some("line-token"), None);

    let body = webhook_body(vec![
        text_event("1", "憨吉過來", "u1", Some("t1"), 1),
        json!({
            "type": "message",
            "message": { "type": "sticker", "id": "2" },
            "timestamp": 2,
            "source": { "type": "user", "userId": "u2" },
            "replyToken": "t2",
            "mode": "active"
        }),
        json!({
            "type": "follow",
            "timestamp": 3,
            "source": { "type": "user", "userId": "u3" },
            "replyToken": "t3",
            "mode": "active"
        }),
        text_event("4", "憨吉握手", "u4", Some("t4"), 4),
        text_event("5", "沒叫名字", "u5", Some("t5"), 5),
    ]);

    let (status, summary) = send_json(&app, "POST", "/api/messages", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["messageCount"], 3);

    let (_, history) = send(&app, "GET", "/api/messages", None).await;
    let texts: Vec<_> = history["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["憨吉過來", "憨吉握手", "沒叫名字"]);
}

#[tokio::test]
async fn test_reply_failure_still_stores_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Invalid reply token"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let app = create_app(&server, Some("line-token"), None);

    let body = webhook_body(vec![
        text_event("1", "憨吉坐下", "u1", Some("expired"), 1),
        text_event("2", "憨吉過來", "u2", Some("expired-too"), 2),
    ]);
    let (status, summary) = send_json(&app, "POST", "/api/messages", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["messageCount"], 2);

    let (_, history) = send(&app, "GET", "/api/messages", None).await;
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.get("reply").is_none()));
}

#[tokio::test]
async fn test_missing_line_token_makes_no_reply_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = create_app(&server, None, Some("gemini-key"));

    let body = webhook_body(vec![text_event("1", "憨吉坐下", "u1", Some("tok1"), 1)]);
    let (status, _) = send_json(&app, "POST", "/api/messages", &body).await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = send(&app, "GET", "/api/messages", None).await;
    assert!(history["messages"][0].get("reply").is_none());
}

#[tokio::test]
async fn test_malformed_webhook_returns_500_and_stores_nothing() {
    let server = MockServer::start().await;
    mount_line_success(&server, 0).await;

    let app = create_app(&server, Some("line-token"), None);

    let (status, body) = send(&app, "POST", "/api/messages", Some(b"{oops".to_vec())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    // Valid JSON, wrong shape
    let (status, _) = send_json(&app, "POST", "/api/messages", &json!({ "events": "x" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, history) = send(&app, "GET", "/api/messages", None).await;
    assert_eq!(history["messages"], json!([]));
}

#[tokio::test]
async fn test_history_is_capped_at_100() {
    let server = MockServer::start().await;
    let app = create_app(&server, Some("line-token"), None);

    for batch in 0..3 {
        let events = (0..50)
            .map(|i| {
                let n = batch * 50 + i;
                text_event(&n.to_string(), &format!("msg {}", n), "u1", None, n)
            })
            .collect();
        let (status, summary) =
            send_json(&app, "POST", "/api/messages", &webhook_body(events)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["messageCount"], 50);
    }

    let (_, history) = send(&app, "GET", "/api/messages", None).await;
    let timestamps: Vec<i64> = history["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["timestamp"].as_i64().unwrap())
        .collect();
    assert_eq!(timestamps, (50..150).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_history_read_is_idempotent() {
    let server = MockServer::start().await;
    let app = create_app(&server, Some("line-token"), None);

    let body = webhook_body(vec![text_event("1", "hello", "u1", None, 1)]);
    send_json(&app, "POST", "/api/messages", &body).await;

    let first = send(&app, "GET", "/api/messages", None).await;
    let second = send(&app, "GET", "/api/messages", None).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_slow_batch_outlasts_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(700)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let handler = create_handler(&server, Some("line-token"), None, 5);
    let config = WebhookServerConfig {
        timeout_secs: 1,
        ..Default::default()
    };
    let app = WebhookServer::with_config(handler, config).router();

    let body = webhook_body(vec![
        text_event("1", "憨吉坐下", "u1", Some("t1"), 1),
        text_event("2", "憨吉坐下", "u2", Some("t2"), 2),
    ]);
    let (status, summary) = send_json(&app, "POST", "/api/messages", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary, json!({ "success": true, "messageCount": 2 }));

    let (_, history) = send(&app, "GET", "/api/messages", None).await;
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m["reply"].is_string()));
}

#[tokio::test]
async fn test_batch_is_stored_when_caller_disconnects() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let handler = create_handler(&server, Some("line-token"), None, 5);
    let app = WebhookServer::new(handler.clone()).router();

    let body = webhook_body(vec![
        text_event("1", "憨吉過來", "u1", Some("t1"), 1),
        text_event("2", "憨吉握手", "u2", Some("t2"), 2),
    ]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    // Drop the request future while the first reply is still in flight
    let dropped = tokio::time::timeout(Duration::from_millis(100), app.oneshot(request)).await;
    assert!(dropped.is_err());

    let mut stored = 0;
    for _ in 0..40 {
        stored = handler.store().len();
        if stored == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(stored, 2);
    assert!(handler.history().messages.iter().all(|m| m.has_reply()));
}

#[tokio::test]
async fn test_reply_timeout_does_not_stop_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .and(body_partial_json(json!({ "replyToken": "slow" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .and(body_partial_json(json!({ "replyToken": "fast" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let handler = create_handler(&server, Some("line-token"), None, 1);
    let app = WebhookServer::new(handler).router();

    let body = webhook_body(vec![
        text_event("1", "憨吉坐下", "u1", Some("slow"), 1),
        text_event("2", "沒叫名字", "u2", Some("skip"), 2),
        text_event("3", "憨吉散步", "u3", Some("fast"), 3),
    ]);
    let (status, summary) = send_json(&app, "POST", "/api/messages", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["messageCount"], 3);

    let (_, history) = send(&app, "GET", "/api/messages", None).await;
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages[0].get("reply").is_none());
    assert!(messages[1].get("reply").is_none());
    assert!(messages[2]["reply"].as_str().unwrap().starts_with("【憨吉】"));
}

// ============================================================================
// Toggle Tests
// ============================================================================

#[tokio::test]
async fn test_toggle_round_trip() {
    let server = MockServer::start().await;
    let app = create_app(&server, Some("line-token"), None);

    let (status, body) = send(&app, "GET", "/api/messages/toggle-ai", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "useAI": false }));

    for value in [true, false] {
        let (status, body) =
            send_json(&app, "PATCH", "/api/messages/toggle-ai", &json!({ "useAI": value })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "useAI": value }));

        let (_, body) = send(&app, "GET", "/api/messages/toggle-ai", None).await;
        assert_eq!(body, json!({ "useAI": value }));

        let (_, history) = send(&app, "GET", "/api/messages", None).await;
        assert_eq!(history["useAI"], value);
    }
}

#[tokio::test]
async fn test_toggle_rejects_non_boolean() {
    let server = MockServer::start().await;
    let app = create_app(&server, Some("line-token"), None);

    send_json(&app, "PATCH", "/api/messages/toggle-ai", &json!({ "useAI": true })).await;

    let (status, body) =
        send_json(&app, "PATCH", "/api/messages/toggle-ai", &json!({ "useAI": "yes" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send_json(&app, "PATCH", "/api/messages/toggle-ai", &json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send(&app, "PATCH", "/api/messages/toggle-ai", Some(b"true".to_vec())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/api/messages/toggle-ai", None).await;
    assert_eq!(body, json!({ "useAI": true }));
}

#[tokio::test]
async fn test_ai_mode_replies_with_gemini_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "汪！我在這裡！" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .and(body_partial_json(json!({
            "messages": [{ "type": "text", "text": "汪！我在這裡！" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_app(&server, Some("line-token"), Some("gemini-key"));
    send_json(&app, "PATCH", "/api/messages/toggle-ai", &json!({ "useAI": true })).await;

    let body = webhook_body(vec![text_event("1", "憨吉你在哪", "u1", Some("tok1"), 1)]);
    let (status, _) = send_json(&app, "POST", "/api/messages", &body).await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = send(&app, "GET", "/api/messages", None).await;
    assert_eq!(history["messages"][0]["reply"], "汪！我在這裡！");
}

// ============================================================================
// Service Endpoints
// ============================================================================

#[tokio::test]
async fn test_health_and_root() {
    let server = MockServer::start().await;
    let app = create_app(&server, None, None);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "hanji");
}
