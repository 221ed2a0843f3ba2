pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod routes;

use std::sync::Arc;

use config::Config;
use db::kv::KeyValueStore;
use db::notifications::NotificationStore;
use gateway::buffer::PollBuffer;
use gateway::fanout::EventPublisher;
use gateway::presence::PresenceTracker;
use gateway::registry::ConnectionRegistry;
use notify::Notifier;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KeyValueStore>,
    pub config: Arc<Config>,
    pub registry: Arc<ConnectionRegistry>,
    pub buffer: Arc<PollBuffer>,
    pub presence: Arc<PresenceTracker>,
    pub notifications: Arc<dyn NotificationStore>,
    pub publisher: EventPublisher,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(
        config: Config,
        kv: Arc<dyn KeyValueStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let buffer = Arc::new(PollBuffer::new(
            config.poll_buffer_depth,
            config.poll_buffer_ttl,
        ));
        let publisher = EventPublisher::new(registry.clone(), buffer.clone());
        let notifier = Notifier::new(notifications.clone(), publisher.clone());

        Self {
            kv,
            config: Arc::new(config),
            registry,
            buffer,
            presence: Arc::new(PresenceTracker::new()),
            notifications,
            publisher,
            notifier,
        }
    }
}
