//! Hanji LLM - generative-AI reply backend
//!
//! Wraps the Google Gemini `generateContent` API behind the
//! [`hanji_core::ReplyGenerator`] trait. Failures never reach the caller:
//! they are logged and turned into fixed fallback replies.

pub mod error;
pub mod provider;

pub use error::LlmError;
pub use provider::google::{
    GoogleConfig, GoogleProvider, AI_UNAVAILABLE_REPLY, NOT_UNDERSTOOD_REPLY,
};
