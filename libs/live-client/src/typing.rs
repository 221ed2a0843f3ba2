//! Ephemeral "is typing" indicators with auto-expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A (chat scope, other party) pair whose indicator changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypingKey {
    pub chat_scope_id: String,
    pub user_id: String,
}

/// Tracks one expiry deadline per (scope, party). A fresh `typing` frame
/// replaces the previous deadline; only the latest one can clear the
/// indicator.
#[derive(Debug)]
pub struct TypingTracker {
    timeout: Duration,
    deadlines: HashMap<TypingKey, Instant>,
}

impl TypingTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadlines: HashMap::new(),
        }
    }

    /// Apply a typing frame. Returns `true` when the visible state changed.
    pub fn apply(&mut self, key: TypingKey, is_typing: bool, now: Instant) -> bool {
        if is_typing {
            self.deadlines.insert(key, now + self.timeout).is_none()
        } else {
            self.deadlines.remove(&key).is_some()
        }
    }

    /// Clear every indicator whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<TypingKey> {
        let expired: Vec<TypingKey> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.deadlines.remove(key);
        }
        expired
    }

    pub fn is_typing(&self, chat_scope_id: &str, user_id: &str) -> bool {
        self.deadlines.keys().any(|k| k.chat_scope_id == chat_scope_id && k.user_id == user_id)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Drop every indicator without reporting it.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}
