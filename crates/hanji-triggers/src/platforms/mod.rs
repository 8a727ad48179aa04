//! Platform abstraction for reply delivery
//!
//! A platform knows how to push a reply back to the chat service that sent a
//! webhook. LINE is the only built-in platform; tests plug in their own.

use async_trait::async_trait;
use thiserror::Error;

pub mod line;

pub use line::{LineConfig, LinePlatform};

/// Platform-specific errors
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Reply delivery trait
///
/// Implement this trait to deliver replies to another chat platform.
#[async_trait]
pub trait ReplyPlatform: Send + Sync {
    /// Send `text` as the reply bound to `reply_token`
    ///
    /// Returns `Ok(())` only when the platform acknowledged the reply with a
    /// success status.
    async fn send_reply(&self, reply_token: &str, text: &str) -> Result<(), PlatformError>;

    /// Whether the credential needed to call the platform is present
    fn is_configured(&self) -> bool;

    /// Get platform name identifier
    fn platform_name(&self) -> &'static str;
}
