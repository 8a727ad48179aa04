//! LINE Messaging API adapter
//!
//! Covers the two halves of the LINE integration:
//! - the webhook payload schema (`{destination, events: [...]}`)
//! - the Reply API (`POST /v2/bot/message/reply`)

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::{PlatformError, ReplyPlatform};

const DEFAULT_API_BASE: &str = "https://api.line.me";
const REPLY_PATH: &str = "/v2/bot/message/reply";

/// LINE webhook request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineWebhookPayload {
    /// Bot user ID that received the events
    pub destination: String,

    pub events: Vec<LineEvent>,
}

/// One webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    /// Event type ("message", "follow", "postback", ...)
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub message: Option<LineMessage>,

    /// Event time in milliseconds since epoch
    pub timestamp: i64,

    pub source: LineSource,

    #[serde(default)]
    pub reply_token: Option<String>,

    /// Channel mode ("active" or "standby")
    pub mode: String,
}

/// Message content of a message event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineMessage {
    /// Message type ("text", "image", "sticker", ...)
    #[serde(rename = "type")]
    pub message_type: String,

    pub id: String,

    #[serde(default)]
    pub text: Option<String>,
}

/// Event source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSource {
    /// Source type ("user", "group" or "room")
    #[serde(rename = "type")]
    pub source_type: String,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub group_id: Option<String>,

    #[serde(default)]
    pub room_id: Option<String>,
}

impl LineWebhookPayload {
    /// Parse a raw webhook body
    pub fn from_slice(raw: &[u8]) -> Result<Self, PlatformError> {
        serde_json::from_slice(raw)
            .map_err(|e| PlatformError::ParseError(format!("Invalid LINE webhook payload: {}", e)))
    }

    /// Events that carry a text message, in delivery order
    pub fn text_message_events(&self) -> impl Iterator<Item = &LineEvent> {
        self.events.iter().filter(|event| event.is_text_message())
    }
}

impl LineEvent {
    pub fn is_text_message(&self) -> bool {
        self.event_type == "message"
            && self
                .message
                .as_ref()
                .map(|m| m.message_type == "text")
                .unwrap_or(false)
    }

    /// Message text, empty when absent
    pub fn text(&self) -> &str {
        self.message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .unwrap_or_default()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.source.user_id.as_deref()
    }

    /// Reply token, ignoring empty strings
    pub fn reply_token(&self) -> Option<&str> {
        self.reply_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Reply API request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    message_type: &'static str,
    text: &'a str,
}

/// LINE configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// Channel access token; `None` makes every reply fail closed
    #[serde(default)]
    pub channel_access_token: Option<String>,

    /// API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_access_token: None,
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// LINE platform adapter
pub struct LinePlatform {
    config: LineConfig,
    client: reqwest::Client,
}

impl LinePlatform {
    /// Create new LINE platform adapter
    pub fn new(config: LineConfig) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PlatformError::Http(format!("Failed to create HTTP client: {}", e)))?;

        if config.channel_access_token.is_none() {
            warn!("LINE channel access token not configured, replies are disabled");
        }

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    fn access_token(&self) -> Option<&str> {
        self.config
            .channel_access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    fn reply_url(&self) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), REPLY_PATH)
    }
}

#[async_trait]
impl ReplyPlatform for LinePlatform {
    async fn send_reply(&self, reply_token: &str, text: &str) -> Result<(), PlatformError> {
        let token = self.access_token().ok_or_else(|| {
            PlatformError::MissingCredential("LINE channel access token".to_string())
        })?;

        let body = ReplyRequest {
            reply_token,
            messages: vec![TextMessage {
                message_type: "text",
                text,
            }],
        };

        let response = self
            .client
            .post(self.reply_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::Http(format!("Failed to send LINE reply: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!("LINE reply failed with status {}: {}", status, detail);
            return Err(PlatformError::ApiError(format!(
                "LINE reply returned {}: {}",
                status, detail
            )));
        }

        debug!("LINE reply delivered");
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.access_token().is_some()
    }

    fn platform_name(&self) -> &'static str {
        "line"
    }
}
