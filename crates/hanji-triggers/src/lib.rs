//! Hanji Triggers - LINE webhook handling for the Hanji bot
//!
//! This crate turns inbound LINE webhook batches into stored history entries
//! and, when a message mentions the persona, into replies:
//!
//! - [`platforms`]: LINE payload schema and Reply API adapter
//! - [`responses`]: canned-response table and its random selection policy
//! - [`dispatcher`]: picks the reply source and delivers the reply
//! - [`handler`]: per-batch orchestration plus history/toggle operations
//! - [`server`]: axum HTTP surface

pub mod dispatcher;
pub mod handler;
pub mod platforms;
pub mod responses;
pub mod server;

pub use dispatcher::{DispatchOutcome, ReplyDispatcher};
pub use handler::{
    HistorySnapshot, ToggleRequest, WebhookError, WebhookHandler, WebhookHandlerConfig,
    WebhookSummary,
};
pub use platforms::line::{LineConfig, LineEvent, LinePlatform, LineWebhookPayload};
pub use platforms::{PlatformError, ReplyPlatform};
pub use responses::{
    CannedCategory, CannedResponder, CannedResponseTable, RandomSource, SeededRandom,
    ThreadRandom, DEFAULT_PERSONA_TAG, GENERIC_CATEGORY,
};
pub use server::{WebhookServer, WebhookServerConfig};
