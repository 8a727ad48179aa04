//! Central webhook handler
//!
//! Owns the shared bot state (message history and AI mode flag) and
//! coordinates each inbound LINE batch:
//!
//! 1. parse the payload (a parse failure aborts the whole batch)
//! 2. keep text message events only
//! 3. reply to events that mention the persona and carry a reply token
//! 4. append one history entry per text event, in event order

use std::sync::Arc;

use hanji_core::{AiModeFlag, MessageStore, StoredMessage, DEFAULT_PERSONA_NAME};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::dispatcher::ReplyDispatcher;
use crate::platforms::line::{LineEvent, LineWebhookPayload};
use crate::platforms::PlatformError;

/// Handler errors surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Failed to parse webhook payload: {0}")]
    Parse(#[from] PlatformError),

    #[error("Invalid toggle request: {0}")]
    InvalidToggle(String),

    #[error("Webhook processing aborted: {0}")]
    Aborted(String),
}

impl WebhookError {
    /// Message returned to clients; details stay in the logs
    pub fn public_message(&self) -> &'static str {
        match self {
            WebhookError::Parse(_) | WebhookError::Aborted(_) => "請求時發生錯誤",
            WebhookError::InvalidToggle(_) => "參數無效",
        }
    }
}

/// Handler configuration
#[derive(Debug, Clone)]
pub struct WebhookHandlerConfig {
    /// Name that must appear in a message for the bot to reply; a blank
    /// name disables replies
    pub persona_name: String,
}

impl Default for WebhookHandlerConfig {
    fn default() -> Self {
        Self {
            persona_name: DEFAULT_PERSONA_NAME.to_string(),
        }
    }
}

/// Response to a processed webhook batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSummary {
    pub success: bool,

    /// Number of text message events in the batch
    pub message_count: usize,
}

/// History read model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub messages: Vec<StoredMessage>,

    #[serde(rename = "useAI")]
    pub use_ai: bool,
}

/// Toggle request body
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ToggleRequest {
    #[serde(rename = "useAI")]
    pub use_ai: bool,
}

impl ToggleRequest {
    /// Parse a raw body; `useAI` must be present and a boolean
    pub fn from_slice(raw: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(raw).map_err(|e| WebhookError::InvalidToggle(e.to_string()))
    }
}

/// Webhook handler
pub struct WebhookHandler {
    config: WebhookHandlerConfig,
    store: Arc<MessageStore>,
    mode: Arc<AiModeFlag>,
    dispatcher: ReplyDispatcher,
}

impl WebhookHandler {
    /// Create a handler around the dispatcher; the AI mode flag is shared
    /// with the dispatcher so toggles take effect on the next reply.
    pub fn new(dispatcher: ReplyDispatcher, store: Arc<MessageStore>) -> Self {
        Self::with_config(dispatcher, store, WebhookHandlerConfig::default())
    }

    pub fn with_config(
        dispatcher: ReplyDispatcher,
        store: Arc<MessageStore>,
        config: WebhookHandlerConfig,
    ) -> Self {
        let mode = dispatcher.mode().clone();
        Self {
            config,
            store,
            mode,
            dispatcher,
        }
    }

    pub fn config(&self) -> &WebhookHandlerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// Whether a message should get a reply
    pub fn is_triggered(&self, text: &str) -> bool {
        let name = self.config.persona_name.trim();
        !name.is_empty() && text.contains(name)
    }

    /// Parse and process a raw webhook body
    pub async fn handle_webhook(&self, raw: &[u8]) -> Result<WebhookSummary, WebhookError> {
        let payload = LineWebhookPayload::from_slice(raw)?;
        Ok(self.handle_payload(&payload).await)
    }

    /// Process an already parsed batch
    pub async fn handle_payload(&self, payload: &LineWebhookPayload) -> WebhookSummary {
        debug!(
            "Received {} LINE events for {}",
            payload.events.len(),
            payload.destination
        );

        let mut stored = Vec::new();
        for event in payload.text_message_events() {
            stored.push(self.process_event(event).await);
        }

        let message_count = stored.len();
        if message_count > 0 {
            let replied = stored.iter().filter(|m| m.has_reply()).count();
            self.store.append(stored);
            info!("Stored {} messages ({} replied)", message_count, replied);
        }

        WebhookSummary {
            success: true,
            message_count,
        }
    }

    async fn process_event(&self, event: &LineEvent) -> StoredMessage {
        let text = event.text();

        let reply = match event.reply_token() {
            Some(token) if self.is_triggered(text) => {
                self.dispatcher.dispatch(token, text).await.reply
            }
            _ => {
                debug!("Skipping reply for message without trigger or reply token");
                None
            }
        };

        StoredMessage::text(text, event.timestamp, event.user_id().map(str::to_string))
            .with_reply(reply)
    }

    /// Stored messages and the current mode
    pub fn history(&self) -> HistorySnapshot {
        HistorySnapshot {
            messages: self.store.snapshot(),
            use_ai: self.mode.get(),
        }
    }

    pub fn use_ai(&self) -> bool {
        self.mode.get()
    }

    /// Apply a toggle request body and return the new value
    pub fn toggle_ai(&self, raw: &[u8]) -> Result<bool, WebhookError> {
        let request = ToggleRequest::from_slice(raw)?;
        let value = self.mode.set(request.use_ai);
        info!("AI replies {}", if value { "enabled" } else { "disabled" });
        Ok(value)
    }
}
