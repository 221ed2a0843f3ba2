//! Connection registry: user id → open stream connections.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::connection::{Connection, QueuedFrame};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("transport closed before registration completed")]
    AlreadyClosed,
}

/// Shared registry of all open connections.
///
/// Uses two `DashMap`s (by connection id, and user id → connection ids) for
/// shard-level concurrency. Fan-out works on a cloned snapshot, so removing one
/// connection never blocks or invalidates a publish touching another.
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<Connection>>,
    by_user: DashMap<String, HashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            by_user: DashMap::new(),
        }
    }

    /// Register a connection after a successful handshake. Registering an id
    /// that is already present returns the existing connection.
    pub fn register(
        &self,
        user_id: &str,
        connection_id: &str,
        outbound: mpsc::Sender<QueuedFrame>,
    ) -> Result<Arc<Connection>, RegistryError> {
        let connection = match self.connections.entry(connection_id.to_string()) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                if outbound.is_closed() {
                    return Err(RegistryError::AlreadyClosed);
                }
                let connection = Arc::new(Connection::new(
                    connection_id.to_string(),
                    user_id.to_string(),
                    outbound,
                ));
                slot.insert(connection.clone());
                connection
            }
        };

        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id.to_string());

        Ok(connection)
    }

    /// Remove a connection and close its queue. Safe to call more than once.
    pub fn unregister(&self, connection_id: &str) -> Option<Arc<Connection>> {
        let (_, connection) = self.connections.remove(connection_id)?;
        connection.mark_closing();

        if let Some(mut ids) = self.by_user.get_mut(&connection.user_id) {
            ids.remove(connection_id);
        }
        self.by_user
            .remove_if(&connection.user_id, |_, ids| ids.is_empty());

        connection.close();
        Some(connection)
    }

    /// Snapshot of a user's open connections. Empty when the user has none.
    pub fn active_connections_for(&self, user_id: &str) -> Vec<Arc<Connection>> {
        let Some(ids) = self.by_user.get(user_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.connections.get(id).map(|c| c.value().clone()))
            .collect()
    }

    /// Snapshot of every open connection.
    pub fn all_connections(&self) -> Vec<Arc<Connection>> {
        self.connections.iter().map(|e| e.value().clone()).collect()
    }

    /// Unregister every connection with no successful write within `timeout`.
    /// Returns the number of connections removed.
    pub fn sweep_idle(&self, now: Instant, timeout: Duration) -> usize {
        let idle: Vec<String> = self
            .connections
            .iter()
            .filter(|e| e.value().is_idle(now, timeout) || e.value().is_closed())
            .map(|e| e.key().clone())
            .collect();

        idle.iter()
            .filter(|id| self.unregister(id).is_some())
            .count()
    }

    /// Close every connection (server shutdown). Returns how many were open.
    pub fn close_all(&self) -> usize {
        let ids: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        ids.iter()
            .filter(|id| self.unregister(id).is_some())
            .count()
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.connections.get(connection_id).map(|c| c.value().clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
