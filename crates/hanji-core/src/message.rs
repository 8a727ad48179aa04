//! Messages retained for the polling history page

use serde::{Deserialize, Serialize};

/// One inbound text message kept in the history buffer
///
/// The JSON shape is what the polling page consumes:
/// `{text, timestamp, userId?, type, reply?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// Message body
    pub text: String,

    /// Platform event time in milliseconds since epoch
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,

    /// Sender identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Platform message type
    #[serde(rename = "type")]
    pub message_type: String,

    /// Reply text actually delivered back to the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl StoredMessage {
    /// Create a text message without a reply
    pub fn text(text: impl Into<String>, timestamp_ms: i64, user_id: Option<String>) -> Self {
        Self {
            text: text.into(),
            timestamp_ms,
            user_id,
            message_type: "text".to_string(),
            reply: None,
        }
    }

    /// Attach the delivered reply
    pub fn with_reply(mut self, reply: Option<String>) -> Self {
        self.reply = reply;
        self
    }

    pub fn has_reply(&self) -> bool {
        self.reply.is_some()
    }
}
