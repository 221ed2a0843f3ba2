//! Short per-user event buffer backing the poll transport.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bazaar_common::Frame;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

/// Ring buffer of recent frames per user, bounded by depth and age
/// (whichever is smaller). Not a history: a client that falls out of the
/// window relies on the reconciliation reads.
pub struct PollBuffer {
    users: DashMap<String, Mutex<VecDeque<Arc<Frame>>>>,
    depth: usize,
    ttl: chrono::Duration,
}

impl PollBuffer {
    pub fn new(depth: usize, ttl: Duration) -> Self {
        Self {
            users: DashMap::new(),
            depth: depth.max(1),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1)),
        }
    }

    /// Append a frame for one user, evicting the oldest past capacity.
    pub fn push(&self, user_id: &str, frame: Arc<Frame>) {
        let entry = self.users.entry(user_id.to_string()).or_default();
        let mut frames = entry.lock();
        frames.push_back(frame);
        while frames.len() > self.depth {
            frames.pop_front();
        }
    }

    /// Frames for `user_id` emitted strictly after `since` and still within
    /// the age window, oldest first. `None` returns the whole window.
    pub fn since(&self, user_id: &str, since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Vec<Frame> {
        let Some(entry) = self.users.get(user_id) else {
            return Vec::new();
        };
        let cutoff = self.cutoff(now);
        let frames = entry.lock();
        frames
            .iter()
            .filter(|f| f.timestamp > cutoff)
            .filter(|f| since.map_or(true, |s| f.timestamp > s))
            .map(|f| Frame::clone(f))
            .collect()
    }

    /// Drop expired frames and users left with nothing. Returns the number of
    /// users removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = self.cutoff(now);
        let before = self.users.len();
        self.users.retain(|_, frames| {
            let mut frames = frames.lock();
            while frames.front().is_some_and(|f| f.timestamp <= cutoff) {
                frames.pop_front();
            }
            !frames.is_empty()
        });
        before - self.users.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_common::EventPayload;

    fn frame_at(ts: DateTime<Utc>, online: u64) -> Arc<Frame> {
        Arc::new(Frame {
            payload: EventPayload::Presence { online_count: online },
            event_id: Some(format!("evt_{online}")),
            timestamp: ts,
        })
    }

    #[test]
    fn since_returns_only_newer_frames() {
        let buffer = PollBuffer::new(50, Duration::from_secs(300));
        let t0 = Utc::now();
        for i in 0..3 {
            buffer.push("u1", frame_at(t0 + chrono::Duration::seconds(i), i as u64));
        }

        let all = buffer.since("u1", None, t0 + chrono::Duration::seconds(5));
        assert_eq!(all.len(), 3);

        let newer = buffer.since("u1", Some(t0), t0 + chrono::Duration::seconds(5));
        assert_eq!(newer.len(), 2);
        assert_eq!(newer[0].event_id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn depth_bound_evicts_oldest() {
        let buffer = PollBuffer::new(50, Duration::from_secs(300));
        let t0 = Utc::now();
        for i in 0..60 {
            buffer.push("u1", frame_at(t0 + chrono::Duration::milliseconds(i), i as u64));
        }

        let frames = buffer.since("u1", None, t0 + chrono::Duration::seconds(1));
        assert_eq!(frames.len(), 50);
        assert_eq!(frames[0].event_id.as_deref(), Some("evt_10"));
    }

    #[test]
    fn age_bound_hides_expired_frames() {
        let buffer = PollBuffer::new(50, Duration::from_secs(300));
        let t0 = Utc::now();
        buffer.push("u1", frame_at(t0, 0));
        buffer.push("u1", frame_at(t0 + chrono::Duration::seconds(200), 1));

        let frames = buffer.since("u1", None, t0 + chrono::Duration::seconds(400));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn prune_removes_empty_users() {
        let buffer = PollBuffer::new(50, Duration::from_secs(300));
        let t0 = Utc::now();
        buffer.push("u1", frame_at(t0, 0));
        buffer.push("u2", frame_at(t0 + chrono::Duration::seconds(250), 1));

        let removed = buffer.prune(t0 + chrono::Duration::seconds(301));
        assert_eq!(removed, 1);
        assert_eq!(buffer.user_count(), 1);
        assert!(buffer.since("u1", None, t0).is_empty());
    }

    #[test]
    fn unknown_user_is_empty() {
        let buffer = PollBuffer::new(50, Duration::from_secs(300));
        assert!(buffer.since("nobody", None, Utc::now()).is_empty());
    }
}
