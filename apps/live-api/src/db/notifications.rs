//! Notification history: the reconciliation-read collaborator.
//!
//! Live frames are fire-and-forget. Anything a user must eventually see is also
//! recorded here so a client that missed the push converges on its next
//! unread-count or recent-notifications read.

use std::collections::VecDeque;

use async_trait::async_trait;
use bazaar_common::wire::{NotificationView, UnreadCounts};
use bazaar_common::{EventKind, EventPayload, Frame, SnowflakeGenerator};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::ApiError;

/// Notifications kept per user; older rows fall off the history.
const MAX_HISTORY_PER_USER: usize = 500;

/// A notification about to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub event_id: String,
    pub kind: EventKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub chat_scope_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    /// Derive the stored row for a frame. Typing, presence and liveness frames
    /// are ephemeral and produce nothing.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        let event_id = frame.event_id.clone()?;
        let (title, message, link, chat_scope_id) = match &frame.payload {
            EventPayload::Message(m) => (
                m.sender_name.clone(),
                m.preview.clone(),
                m.link.clone(),
                Some(m.chat_scope_id.clone()),
            ),
            EventPayload::Badge(b) => (
                format!("Achievement unlocked: {}", b.name),
                b.description.clone(),
                None,
                None,
            ),
            EventPayload::Hire(n)
            | EventPayload::Review(n)
            | EventPayload::Task(n)
            | EventPayload::Login(n) => (n.title.clone(), n.message.clone(), n.link.clone(), None),
            EventPayload::Connected { .. }
            | EventPayload::Heartbeat
            | EventPayload::Typing(_)
            | EventPayload::Presence { .. } => return None,
        };

        Some(Self {
            event_id,
            kind: frame.kind(),
            title,
            message,
            link,
            chat_scope_id,
            created_at: frame.timestamp,
        })
    }
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Store a notification for `user_id`. Recording the same `event_id`
    /// twice for one user is a no-op.
    async fn record(&self, user_id: &str, notification: NewNotification) -> Result<(), ApiError>;
    async fn unread_counts(&self, user_id: &str) -> Result<UnreadCounts, ApiError>;
    /// Newest first, at most `limit` rows.
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<NotificationView>, ApiError>;
    /// Mark one chat scope's messages read, or with `None` every non-message
    /// notification.
    async fn mark_read(&self, user_id: &str, chat_scope_id: Option<&str>) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

struct StoredNotification {
    id: i64,
    row: NewNotification,
    read: bool,
}

impl StoredNotification {
    fn view(&self) -> NotificationView {
        NotificationView {
            id: self.id.to_string(),
            event_id: self.row.event_id.clone(),
            kind: self.row.kind.as_str().to_string(),
            title: self.row.title.clone(),
            message: self.row.message.clone(),
            link: self.row.link.clone(),
            chat_scope_id: self.row.chat_scope_id.clone(),
            read: self.read,
            created_at: self.row.created_at,
        }
    }
}

pub struct MemoryNotificationStore {
    users: DashMap<String, Mutex<VecDeque<StoredNotification>>>,
    ids: SnowflakeGenerator,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            ids: SnowflakeGenerator::new(),
        }
    }
}

impl Default for MemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn record(&self, user_id: &str, notification: NewNotification) -> Result<(), ApiError> {
        let entry = self.users.entry(user_id.to_string()).or_default();
        let mut rows = entry.lock();
        if rows.iter().any(|r| r.row.event_id == notification.event_id) {
            return Ok(());
        }
        rows.push_back(StoredNotification {
            id: self.ids.generate(),
            row: notification,
            read: false,
        });
        while rows.len() > MAX_HISTORY_PER_USER {
            rows.pop_front();
        }
        Ok(())
    }

    async fn unread_counts(&self, user_id: &str) -> Result<UnreadCounts, ApiError> {
        let mut counts = UnreadCounts::default();
        let Some(entry) = self.users.get(user_id) else {
            return Ok(counts);
        };
        let rows = entry.lock();
        counts.counted_through = rows.iter().map(|r| r.row.created_at).max();
        for stored in rows.iter().filter(|r| !r.read) {
            match (&stored.row.kind, &stored.row.chat_scope_id) {
                (EventKind::Message, Some(scope)) => {
                    counts.messages += 1;
                    *counts.chats.entry(scope.clone()).or_insert(0) += 1;
                }
                _ => counts.notifications += 1,
            }
        }
        Ok(counts)
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<NotificationView>, ApiError> {
        let Some(entry) = self.users.get(user_id) else {
            return Ok(Vec::new());
        };
        let rows = entry.lock();
        Ok(rows.iter().rev().take(limit).map(StoredNotification::view).collect())
    }

    async fn mark_read(&self, user_id: &str, chat_scope_id: Option<&str>) -> Result<(), ApiError> {
        let Some(entry) = self.users.get(user_id) else {
            return Ok(());
        };
        for stored in entry.lock().iter_mut() {
            let matches = match chat_scope_id {
                Some(scope) => {
                    stored.row.kind == EventKind::Message
                        && stored.row.chat_scope_id.as_deref() == Some(scope)
                }
                None => stored.row.kind != EventKind::Message,
            };
            if matches {
                stored.read = true;
            }
        }
        Ok(())
    }
}
