//! Frame format shared by the live-delivery server and its clients.
//!
//! Every frame is one JSON object: `{ "type": ..., ...fields, "event_id"?, "timestamp" }`.
//! The stream transport writes it as `data: <json>\n\n`; the poll transport
//! returns a list of the same objects.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Heartbeat,
    Message,
    Typing,
    Badge,
    Hire,
    Review,
    Task,
    Login,
    Presence,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::Heartbeat => "heartbeat",
            EventKind::Message => "message",
            EventKind::Typing => "typing",
            EventKind::Badge => "badge",
            EventKind::Hire => "hire",
            EventKind::Review => "review",
            EventKind::Task => "task",
            EventKind::Login => "login",
            EventKind::Presence => "presence",
        }
    }

    /// Liveness frames confirm the transport works and are never shown.
    pub const fn is_liveness(self) -> bool {
        matches!(self, EventKind::Connected | EventKind::Heartbeat)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message_id: String,
    pub chat_scope_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub chat_scope_id: String,
    /// The remote party who is typing.
    pub user_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgePayload {
    pub badge_id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
}

/// Shared shape of hire/review/task/login notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Persisted id of the domain entity behind the notification, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Connected {
        connection_id: String,
        heartbeat_interval_ms: u64,
    },
    Heartbeat,
    Message(MessagePayload),
    Typing(TypingPayload),
    Badge(BadgePayload),
    Hire(NotificationPayload),
    Review(NotificationPayload),
    Task(NotificationPayload),
    Login(NotificationPayload),
    Presence {
        online_count: u64,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Connected { .. } => EventKind::Connected,
            EventPayload::Heartbeat => EventKind::Heartbeat,
            EventPayload::Message(_) => EventKind::Message,
            EventPayload::Typing(_) => EventKind::Typing,
            EventPayload::Badge(_) => EventKind::Badge,
            EventPayload::Hire(_) => EventKind::Hire,
            EventPayload::Review(_) => EventKind::Review,
            EventPayload::Task(_) => EventKind::Task,
            EventPayload::Login(_) => EventKind::Login,
            EventPayload::Presence { .. } => EventKind::Presence,
        }
    }

    /// Persisted id of the domain entity this event describes.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            EventPayload::Message(m) => Some(&m.message_id),
            EventPayload::Badge(b) => Some(&b.badge_id),
            EventPayload::Hire(n)
            | EventPayload::Review(n)
            | EventPayload::Task(n)
            | EventPayload::Login(n) => n.entity_id.as_deref(),
            _ => None,
        }
    }

}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One event as it travels over either transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(flatten)]
    pub payload: EventPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Frame {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn connected(connection_id: &str, heartbeat_interval_ms: u64) -> Self {
        Self {
            payload: EventPayload::Connected {
                connection_id: connection_id.to_string(),
                heartbeat_interval_ms,
            },
            event_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            payload: EventPayload::Heartbeat,
            event_id: None,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP bodies
// ---------------------------------------------------------------------------

/// Response of the poll endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PollResponse {
    #[schema(value_type = Vec<Object>)]
    pub events: Vec<Frame>,
}

/// Authoritative unread totals (reconciliation read).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UnreadCounts {
    /// Unread chat messages across all chat scopes.
    pub messages: u32,
    /// Unread non-message notifications (hire, review, task, badge, login).
    pub notifications: u32,
    /// Unread messages per chat scope.
    #[serde(default)]
    pub chats: BTreeMap<String, u32>,
    /// Timestamp of the newest stored notification these totals include.
    /// Frames stamped at or before it are already counted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counted_through: Option<DateTime<Utc>>,
}

impl UnreadCounts {
    pub fn total(&self) -> u32 {
        self.messages + self.notifications
    }
}

/// A stored notification as returned by the recent-notifications read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationView {
    pub id: String,
    /// Same id the live frame carried, so clients can pre-seed dedup.
    pub event_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub chat_scope_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NotificationsResponse {
    pub notifications: Vec<NotificationView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PresenceSnapshot {
    pub online_count: u64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TypingRequest {
    pub recipient_id: String,
    pub chat_scope_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MarkReadRequest {
    /// Only mark this chat scope's messages read; `None` marks all
    /// non-message notifications read.
    #[serde(default)]
    pub chat_scope_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_frame_flattens_payload_next_to_type() {
        let frame = Frame {
            payload: EventPayload::Message(MessagePayload {
                message_id: "m1".into(),
                chat_scope_id: "task:1".into(),
                sender_id: "usr_a".into(),
                sender_name: "Ada".into(),
                preview: "hi".into(),
                link: None,
            }),
            event_id: Some("message:m1".into()),
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["message_id"], "m1");
        assert_eq!(value["event_id"], "message:m1");
        assert!(value["timestamp"].is_string());
        assert!(value.get("link").is_none());
    }

    #[test]
    fn heartbeat_frame_parses_without_event_id() {
        let raw = json!({ "type": "heartbeat", "timestamp": "2026-10-19T10:00:00Z" });
        let frame: Frame = serde_json::from_value(raw).unwrap();
        assert_eq!(frame.kind(), EventKind::Heartbeat);
        assert!(frame.event_id.is_none());
        assert!(frame.kind().is_liveness());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let raw = json!({ "type": "sparkles", "timestamp": "2026-10-19T10:00:00Z" });
        assert!(serde_json::from_value::<Frame>(raw).is_err());
    }

    #[test]
    fn notification_entity_id_drives_entity_lookup() {
        let payload = EventPayload::Hire(NotificationPayload {
            title: "Hired".into(),
            message: "You got the job".into(),
            link: Some("/tasks/9".into()),
            entity_id: Some("resp_9".into()),
        });
        assert_eq!(payload.entity_id(), Some("resp_9"));
        assert_eq!(payload.kind().as_str(), "hire");
    }
}
