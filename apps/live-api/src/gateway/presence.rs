//! Approximate online-user count derived from activity timestamps.
//!
//! A user counts as online while their most recent "I'm active" report (or
//! stream open) is within the presence window. Several tabs for one user
//! collapse naturally because they overwrite the same timestamp.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bazaar_common::wire::PresenceSnapshot;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

pub struct PresenceTracker {
    activity: DashMap<String, Instant>,
    online_count: AtomicU64,
    computed_at: Mutex<DateTime<Utc>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            activity: DashMap::new(),
            online_count: AtomicU64::new(0),
            computed_at: Mutex::new(Utc::now()),
        }
    }

    /// Record activity for a user.
    pub fn touch(&self, user_id: &str, now: Instant) {
        self.activity
            .entry(user_id.to_string())
            .and_modify(|at| *at = (*at).max(now))
            .or_insert(now);
    }

    /// Recompute the online count, forgetting users outside `window`.
    pub fn recompute(&self, now: Instant, window: Duration) -> u64 {
        self.activity
            .retain(|_, at| now.saturating_duration_since(*at) <= window);
        let count = self.activity.len() as u64;
        self.online_count.store(count, Ordering::Release);
        *self.computed_at.lock() = Utc::now();
        count
    }

    /// The last computed value; never recomputes.
    pub fn snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot {
            online_count: self.online_count.load(Ordering::Acquire),
            computed_at: *self.computed_at.lock(),
        }
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
