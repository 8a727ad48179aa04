//! Reply dispatch
//!
//! Chooses between the AI generator and the canned responder based on the
//! AI mode flag, then delivers the reply through the platform.

use std::sync::Arc;

use hanji_core::{AiModeFlag, SharedGenerator};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::platforms::ReplyPlatform;

/// Result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub success: bool,

    /// Reply text, set only when the platform accepted it
    pub reply: Option<String>,
}

impl DispatchOutcome {
    pub fn delivered(reply: String) -> Self {
        Self {
            success: true,
            reply: Some(reply),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            reply: None,
        }
    }
}

/// Reply dispatcher
pub struct ReplyDispatcher {
    platform: Arc<dyn ReplyPlatform>,
    ai: SharedGenerator,
    canned: SharedGenerator,
    mode: Arc<AiModeFlag>,
}

impl ReplyDispatcher {
    pub fn new(
        platform: Arc<dyn ReplyPlatform>,
        ai: SharedGenerator,
        canned: SharedGenerator,
        mode: Arc<AiModeFlag>,
    ) -> Self {
        Self {
            platform,
            ai,
            canned,
            mode,
        }
    }

    pub fn mode(&self) -> &Arc<AiModeFlag> {
        &self.mode
    }

    /// Generate a reply for `text` and send it with `reply_token`
    ///
    /// Never fails: a missing credential, transport error or rejected reply
    /// all yield [`DispatchOutcome::failed`].
    pub async fn dispatch(&self, reply_token: &str, text: &str) -> DispatchOutcome {
        if !self.platform.is_configured() {
            warn!(
                "{} credential missing, not replying",
                self.platform.platform_name()
            );
            return DispatchOutcome::failed();
        }

        let generator = if self.mode.get() { &self.ai } else { &self.canned };
        let reply = generator.generate(text).await;
        debug!("Generated reply with {}: {}", generator.name(), reply);

        match self.platform.send_reply(reply_token, &reply).await {
            Ok(()) => {
                info!(
                    "Replied via {} using {} generator",
                    self.platform.platform_name(),
                    generator.name()
                );
                DispatchOutcome::delivered(reply)
            }
            Err(e) => {
                error!("Failed to deliver reply: {}", e);
                DispatchOutcome::failed()
            }
        }
    }
}
