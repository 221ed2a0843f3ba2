//! Entry point for domain code: persist the notification row, then push.
//!
//! The row is written before the live push so a client that reconciles right
//! after receiving the frame already sees it counted.

use std::sync::Arc;

use crate::db::notifications::{NewNotification, NotificationStore};
use crate::gateway::events::Event;
use crate::gateway::fanout::{EventPublisher, PublishOutcome};

#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn NotificationStore>,
    publisher: EventPublisher,
}

impl Notifier {
    pub fn new(store: Arc<dyn NotificationStore>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    /// Record (where the kind is persistent) and publish. A storage failure is
    /// logged and does not stop delivery.
    pub async fn emit(&self, event: Event) -> PublishOutcome {
        if let Some(row) = NewNotification::from_frame(&event.frame) {
            for user_id in &event.recipients {
                if let Err(err) = self.store.record(user_id, row.clone()).await {
                    tracing::error!(
                        %user_id,
                        event_id = %row.event_id,
                        %err,
                        "failed to record notification"
                    );
                }
            }
        }
        self.publisher.publish(&event)
    }
}
