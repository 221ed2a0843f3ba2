//! One open live-delivery channel (a single browser tab).

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bazaar_common::Frame;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Lifecycle of a connection: `Opening -> Open -> Closing -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Opening = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Opening,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stream,
}

/// A frame waiting in a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct QueuedFrame {
    pub frame: Arc<Frame>,
    pub queued_at: Instant,
}

impl QueuedFrame {
    pub fn new(frame: Arc<Frame>) -> Self {
        Self {
            frame,
            queued_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("outbound queue full")]
    Full,
    #[error("connection closed")]
    Closed,
}

pub struct Connection {
    pub connection_id: String,
    pub user_id: String,
    pub transport: Transport,
    pub opened_at: DateTime<Utc>,
    last_heartbeat_at: Mutex<Instant>,
    state: AtomicU8,
    /// Taken on close so the stream's receiver sees end-of-queue even while
    /// other tasks still hold an `Arc<Connection>`.
    outbound: Mutex<Option<mpsc::Sender<QueuedFrame>>>,
}

impl Connection {
    pub fn new(connection_id: String, user_id: String, outbound: mpsc::Sender<QueuedFrame>) -> Self {
        Self {
            connection_id,
            user_id,
            transport: Transport::Stream,
            opened_at: Utc::now(),
            last_heartbeat_at: Mutex::new(Instant::now()),
            state: AtomicU8::new(ConnectionState::Opening as u8),
            outbound: Mutex::new(Some(outbound)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Opening -> Open`. Returns `true` only for the call that made the
    /// transition.
    pub fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Opening as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_closing(&self) {
        let _ = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
            (s < ConnectionState::Closing as u8).then_some(ConnectionState::Closing as u8)
        });
    }

    /// Drop the outbound sender and move to `Closed`.
    pub(crate) fn close(&self) {
        self.outbound.lock().take();
        self.state.store(ConnectionState::Closed as u8, Ordering::Release);
    }

    pub fn touch(&self, now: Instant) {
        *self.last_heartbeat_at.lock() = now;
    }

    pub fn last_heartbeat_at(&self) -> Instant {
        *self.last_heartbeat_at.lock()
    }

    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat_at()) > timeout
    }

    pub fn is_closed(&self) -> bool {
        match self.outbound.lock().as_ref() {
            Some(tx) => tx.is_closed(),
            None => true,
        }
    }

    /// Queue a frame without waiting.
    pub fn try_write(&self, frame: Arc<Frame>) -> Result<(), WriteError> {
        let guard = self.outbound.lock();
        let tx = guard.as_ref().ok_or(WriteError::Closed)?;
        tx.try_send(QueuedFrame::new(frame)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => WriteError::Full,
            mpsc::error::TrySendError::Closed(_) => WriteError::Closed,
        })
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connection_id", &self.connection_id)
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish()
    }
}
