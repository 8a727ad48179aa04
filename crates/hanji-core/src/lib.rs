// Hanji Core - Foundation types for the Hanji LINE bot
//
// This crate holds the state shared by every request: the bounded message
// history, the AI reply toggle and the reply generator abstraction that both
// the Gemini backend and the canned-response table implement.

pub mod error;
pub mod generator;
pub mod message;
pub mod mode;
pub mod store;

// Re-export core types
pub use error::{HanjiError, HanjiResult};
pub use generator::{ReplyGenerator, SharedGenerator};
pub use message::StoredMessage;
pub use mode::AiModeFlag;
pub use store::{MessageStore, DEFAULT_HISTORY_CAPACITY};

/// Default persona name; messages containing it trigger a reply
pub const DEFAULT_PERSONA_NAME: &str = "憨吉";
