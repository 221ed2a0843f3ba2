//! Event publisher: fans a published event out to every open connection of
//! each recipient.
//!
//! Writes are `try_send` into each connection's bounded queue. A connection
//! whose queue is full or closed is treated as dead and unregistered; the
//! publishing domain call never waits on a client's network.

use std::sync::Arc;

use bazaar_common::{EventPayload, Frame};
use chrono::Utc;

use super::buffer::PollBuffer;
use super::connection::{Connection, WriteError};
use super::events::{assign_event_id, Event};
use super::registry::ConnectionRegistry;

/// What a single publish did. Informational only; publishing never fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Clone)]
pub struct EventPublisher {
    registry: Arc<ConnectionRegistry>,
    buffer: Arc<PollBuffer>,
}

impl EventPublisher {
    pub fn new(registry: Arc<ConnectionRegistry>, buffer: Arc<PollBuffer>) -> Self {
        Self { registry, buffer }
    }

    /// Deliver to every open connection of every recipient and append to the
    /// recipients' poll buffers. A recipient with no open connection is a
    /// silent no-op for the live push.
    pub fn publish(&self, event: &Event) -> PublishOutcome {
        let frame = Arc::new(event.frame.clone());
        let mut outcome = PublishOutcome::default();

        for user_id in &event.recipients {
            self.buffer.push(user_id, frame.clone());
            for connection in self.registry.active_connections_for(user_id) {
                self.deliver(&connection, &frame, &mut outcome);
            }
        }

        tracing::debug!(
            event_id = event.event_id().unwrap_or_default(),
            kind = %frame.kind(),
            recipients = event.recipients.len(),
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "event published"
        );
        outcome
    }

    /// Deliver a payload to every open connection regardless of user. Not
    /// buffered for polling.
    pub fn broadcast(&self, payload: EventPayload) -> PublishOutcome {
        let event_id = assign_event_id(&payload);
        let frame = Arc::new(Frame {
            payload,
            event_id,
            timestamp: Utc::now(),
        });
        let mut outcome = PublishOutcome::default();
        for connection in self.registry.all_connections() {
            self.deliver(&connection, &frame, &mut outcome);
        }
        outcome
    }

    fn deliver(&self, connection: &Connection, frame: &Arc<Frame>, outcome: &mut PublishOutcome) {
        match connection.try_write(frame.clone()) {
            Ok(()) => outcome.delivered += 1,
            Err(err) => {
                match err {
                    WriteError::Full => tracing::warn!(
                        connection_id = %connection.connection_id,
                        user_id = %connection.user_id,
                        "outbound queue full, dropping slow connection"
                    ),
                    WriteError::Closed => tracing::debug!(
                        connection_id = %connection.connection_id,
                        "write to closed connection"
                    ),
                }
                self.registry.unregister(&connection.connection_id);
                outcome.dropped += 1;
            }
        }
    }
}
