//! Error types shared across the Hanji crates

use thiserror::Error;

/// Result alias used by the core crate and configuration loaders
pub type HanjiResult<T> = Result<T, HanjiError>;

/// Core error type
#[derive(Debug, Error)]
pub enum HanjiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HanjiError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
