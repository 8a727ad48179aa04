//! AI reply mode toggle

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether replies come from the AI backend (`true`) or the canned table
#[derive(Debug, Default)]
pub struct AiModeFlag {
    enabled: AtomicBool,
}

impl AiModeFlag {
    /// Create a flag with the given initial value
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn get(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Set the flag and return the value just set
    pub fn set(&self, value: bool) -> bool {
        self.enabled.store(value, Ordering::SeqCst);
        value
    }
}
