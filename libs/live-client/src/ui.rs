//! UI signal bus.
//!
//! The reconciler never touches UI components directly. It publishes
//! [`UiEvent`]s on a broadcast channel and each component (badge counters,
//! toast host, chat pane, achievement modal) subscribes to what it renders.

use std::sync::Arc;

use bazaar_common::wire::{BadgePayload, MessagePayload};
use bazaar_common::EventKind;
use tokio::sync::broadcast;

use crate::transport::TransportMode;

/// Slow subscribers that fall behind skip events (`RecvError::Lagged`).
const UI_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreadState {
    pub messages: u32,
    pub notifications: u32,
}

impl UnreadState {
    pub fn total(&self) -> u32 {
        self.messages + self.notifications
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: EventKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    UnreadChanged(UnreadState),
    Toast(Toast),
    MessageAppended(MessagePayload),
    TypingChanged {
        chat_scope_id: String,
        user_id: String,
        is_typing: bool,
    },
    AchievementShown(BadgePayload),
    AchievementDismissed { badge_id: String },
    OnlineCount(u64),
    TransportChanged(TransportMode),
}

/// Cloneable handle to the bus; inject one per page.
#[derive(Clone)]
pub struct UiBus {
    sender: broadcast::Sender<Arc<UiEvent>>,
}

impl UiBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(UI_BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<UiEvent>> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: UiEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }
}

impl Default for UiBus {
    fn default() -> Self {
        Self::new()
    }
}
