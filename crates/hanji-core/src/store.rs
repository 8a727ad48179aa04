//! Bounded in-memory message history
//!
//! Keeps the most recent messages for the polling page. When the capacity is
//! exceeded the oldest entries are dropped first. Nothing is persisted; the
//! history starts empty on every restart.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::debug;

use crate::message::StoredMessage;

/// Number of messages kept when no capacity is configured
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// FIFO message buffer with a fixed capacity
///
/// `append` extends and truncates under a single lock, so concurrent webhook
/// requests never observe (or resurrect) entries another append evicted.
#[derive(Debug)]
pub struct MessageStore {
    capacity: usize,
    entries: Mutex<VecDeque<StoredMessage>>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    /// Create a store holding at most [`DEFAULT_HISTORY_CAPACITY`] messages
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a store with a custom capacity (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append messages in order, evicting the oldest beyond capacity
    ///
    /// Returns the number of evicted messages.
    pub fn append<I>(&self, messages: I) -> usize
    where
        I: IntoIterator<Item = StoredMessage>,
    {
        let mut entries = self.entries.lock();
        entries.extend(messages);

        let evicted = entries.len().saturating_sub(self.capacity);
        if evicted > 0 {
            entries.drain(..evicted);
            debug!("Evicted {} messages from history", evicted);
        }
        evicted
    }

    /// Current contents, oldest first
    pub fn snapshot(&self) -> Vec<StoredMessage> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
