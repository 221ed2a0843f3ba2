//! Server-side events: a frame plus the users it is addressed to.

use bazaar_common::id::{prefix, prefixed_ulid};
use bazaar_common::{EventPayload, Frame};
use chrono::{DateTime, Utc};

/// A fact to deliver, created by a domain collaborator at the moment of the
/// underlying state change.
#[derive(Debug, Clone)]
pub struct Event {
    pub frame: Frame,
    pub recipients: Vec<String>,
}

impl Event {
    pub fn new<I, S>(payload: EventPayload, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::at(payload, recipients, Utc::now())
    }

    /// Build an event with an explicit emission time.
    pub fn at<I, S>(payload: EventPayload, recipients: I, emitted_at: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut recipients: Vec<String> = recipients.into_iter().map(Into::into).collect();
        recipients.sort();
        recipients.dedup();

        let event_id = assign_event_id(&payload);
        Self {
            frame: Frame {
                payload,
                event_id,
                timestamp: emitted_at,
            },
            recipients,
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        self.frame.event_id.as_deref()
    }
}

/// Dedup key for a payload.
///
/// Entity-backed events use `<type>:<entity id>` so a re-publish of the same
/// message or badge collapses on the client. Everything else gets a fresh
/// server id. Liveness frames carry none.
pub fn assign_event_id(payload: &EventPayload) -> Option<String> {
    let kind = payload.kind();
    if kind.is_liveness() {
        return None;
    }
    Some(match payload.entity_id() {
        Some(id) => format!("{kind}:{id}"),
        None => prefixed_ulid(prefix::EVENT),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_common::wire::{BadgePayload, NotificationPayload, TypingPayload};

    fn badge(id: &str) -> EventPayload {
        EventPayload::Badge(BadgePayload {
            badge_id: id.into(),
            name: "First task".into(),
            icon: "trophy".into(),
            description: "Completed a first task".into(),
        })
    }

    #[test]
    fn entity_events_get_stable_ids() {
        let a = Event::new(badge("first_task_completed"), ["u1"]);
        let b = Event::new(badge("first_task_completed"), ["u1"]);
        assert_eq!(a.event_id(), Some("badge:first_task_completed"));
        assert_eq!(a.event_id(), b.event_id());
    }

    #[test]
    fn entityless_events_get_unique_server_ids() {
        let payload = EventPayload::Task(NotificationPayload {
            title: "New response".into(),
            message: "Someone responded".into(),
            link: Some("/tasks/3".into()),
            entity_id: None,
        });
        let a = Event::new(payload.clone(), ["u1"]);
        let b = Event::new(payload, ["u1"]);
        assert!(a.event_id().unwrap().starts_with("evt_"));
        assert_ne!(a.event_id(), b.event_id());
    }

    #[test]
    fn typing_events_are_not_entity_backed() {
        let event = Event::new(
            EventPayload::Typing(TypingPayload {
                chat_scope_id: "c".into(),
                user_id: "u2".into(),
                is_typing: true,
            }),
            ["u1"],
        );
        assert!(event.event_id().unwrap().starts_with("evt_"));
    }

    #[test]
    fn liveness_frames_have_no_id() {
        assert!(assign_event_id(&EventPayload::Heartbeat).is_none());
    }

    #[test]
    fn duplicate_recipients_are_collapsed() {
        let event = Event::new(badge("b"), ["u2", "u1", "u2"]);
        assert_eq!(event.recipients, vec!["u1", "u2"]);
    }
}
