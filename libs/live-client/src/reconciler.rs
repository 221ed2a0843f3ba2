//! Client-side state for live delivery.
//!
//! [`Reconciler`] owns transport selection, dedup, unread counters, typing
//! indicators and the achievement queue. Stream frames, poll results and
//! cold-start reads all enter through [`Reconciler::apply`] (or one of its
//! decoding wrappers), so dedup and dispatch are defined once.
//!
//! Nothing here performs IO. Requested side effects accumulate as
//! [`Effect`]s that the driver drains with [`Reconciler::take_effects`].

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use bazaar_common::wire::{MessagePayload, NotificationView, UnreadCounts};
use bazaar_common::{EventKind, EventPayload, Frame};
use chrono::{DateTime, Utc};

use crate::achievements::{AchievementChange, AchievementQueue};
use crate::activity::ActivityReporter;
use crate::config::ClientConfig;
use crate::dedup::DedupCache;
use crate::transport::{Command, TransportMachine, TransportMode};
use crate::typing::{TypingKey, TypingTracker};
use crate::ui::{Toast, UiBus, UiEvent, UnreadState};

/// IO the driver must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenStream,
    CloseStream,
    Poll { since: Option<DateTime<Utc>> },
    /// Refresh the online count while no stream delivers presence frames.
    ReadPresence,
    ReconcileUnread,
    MarkRead { chat_scope_id: Option<String> },
    ReportActivity,
}

/// What [`Reconciler::apply`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// `connected` or `heartbeat`; fed to the transport only.
    Liveness,
    Dispatched(EventKind),
    Duplicate,
    Malformed,
}

pub struct Reconciler {
    bus: UiBus,
    transport: TransportMachine,
    dedup: DedupCache,
    typing: TypingTracker,
    achievements: AchievementQueue,
    activity: ActivityReporter,
    unread: UnreadState,
    chats: BTreeMap<String, u32>,
    open_pane: Option<String>,
    pane_messages: Vec<MessagePayload>,
    online_count: Option<u64>,
    last_event_at: Option<DateTime<Utc>>,
    /// Newest notification timestamp already included in `unread`.
    counted_through: Option<DateTime<Utc>>,
    effects: VecDeque<Effect>,
}

impl Reconciler {
    pub fn new(config: &ClientConfig, bus: UiBus, now: Instant) -> Self {
        Self {
            bus,
            transport: TransportMachine::new(config),
            dedup: DedupCache::new(config.dedup_capacity),
            typing: TypingTracker::new(config.typing_timeout),
            achievements: AchievementQueue::new(config.achievement_display, config.achievement_gap),
            activity: ActivityReporter::new(config.activity_interval, config.activity_debounce, now),
            unread: UnreadState::default(),
            chats: BTreeMap::new(),
            open_pane: None,
            pane_messages: Vec::new(),
            online_count: None,
            last_event_at: None,
            counted_through: None,
            effects: VecDeque::new(),
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.drive(|t| t.start(now));
        self.tick(now);
    }

    pub fn stop(&mut self) {
        self.drive(|t| t.stop());
        self.typing.clear();
    }

    // -----------------------------------------------------------------------
    // Incoming data
    // -----------------------------------------------------------------------

    /// Decode one stream `data` payload and apply it.
    pub fn apply_raw(&mut self, data: &str, now: Instant) -> Applied {
        match serde_json::from_str::<Frame>(data) {
            Ok(frame) => self.apply(frame, now),
            Err(err) => {
                tracing::warn!(%err, len = data.len(), "dropping malformed frame");
                Applied::Malformed
            }
        }
    }

    /// Apply one poll result entry.
    pub fn apply_value(&mut self, value: serde_json::Value, now: Instant) -> Applied {
        match serde_json::from_value::<Frame>(value) {
            Ok(frame) => self.apply(frame, now),
            Err(err) => {
                tracing::warn!(%err, "dropping malformed polled frame");
                Applied::Malformed
            }
        }
    }

    pub fn apply(&mut self, frame: Frame, now: Instant) -> Applied {
        match &frame.payload {
            EventPayload::Connected {
                heartbeat_interval_ms,
                ..
            } => {
                let heartbeat = Duration::from_millis(*heartbeat_interval_ms);
                self.drive(|t| t.on_connected(heartbeat, now));
                return Applied::Liveness;
            }
            EventPayload::Heartbeat => {
                self.transport.on_frame(now);
                return Applied::Liveness;
            }
            _ => {}
        }

        self.transport.on_frame(now);
        match frame.event_id.as_deref() {
            Some(event_id) => {
                if !self.dedup.insert(event_id) {
                    tracing::debug!(%event_id, "duplicate event ignored");
                    return Applied::Duplicate;
                }
            }
            None => tracing::debug!(kind = %frame.kind(), "event without id, dedup skipped"),
        }

        self.last_event_at = Some(match self.last_event_at {
            Some(prev) => prev.max(frame.timestamp),
            None => frame.timestamp,
        });

        let kind = frame.kind();
        let counted = self.counted_through.is_some_and(|t| frame.timestamp <= t);
        if counted {
            tracing::debug!(%kind, "frame already in reconciled totals");
        }
        self.dispatch(kind, frame.payload, counted, now);
        Applied::Dispatched(kind)
    }

    /// `counted` frames still reach the UI but leave the counters alone.
    fn dispatch(&mut self, kind: EventKind, payload: EventPayload, counted: bool, now: Instant) {
        match payload {
            EventPayload::Message(message) => {
                if self.open_pane.as_deref() == Some(message.chat_scope_id.as_str()) {
                    self.effects.push_back(Effect::MarkRead {
                        chat_scope_id: Some(message.chat_scope_id.clone()),
                    });
                    self.pane_messages.push(message.clone());
                    self.bus.emit(UiEvent::MessageAppended(message));
                } else {
                    if !counted {
                        self.unread.messages += 1;
                        *self.chats.entry(message.chat_scope_id.clone()).or_insert(0) += 1;
                        self.emit_unread();
                    }
                    self.bus.emit(UiEvent::Toast(Toast {
                        kind,
                        title: message.sender_name,
                        message: message.preview,
                        link: message.link,
                    }));
                }
            }
            EventPayload::Typing(typing) => {
                let key = TypingKey {
                    chat_scope_id: typing.chat_scope_id,
                    user_id: typing.user_id,
                };
                if self.typing.apply(key.clone(), typing.is_typing, now) {
                    self.bus.emit(UiEvent::TypingChanged {
                        chat_scope_id: key.chat_scope_id,
                        user_id: key.user_id,
                        is_typing: typing.is_typing,
                    });
                }
            }
            EventPayload::Badge(badge) => {
                self.count_notification(counted);
                let changes = self.achievements.push(badge, now);
                self.emit_achievements(changes);
            }
            EventPayload::Login(_) => self.count_notification(counted),
            EventPayload::Hire(n) | EventPayload::Review(n) | EventPayload::Task(n) => {
                self.count_notification(counted);
                self.bus.emit(UiEvent::Toast(Toast {
                    kind,
                    title: n.title,
                    message: n.message,
                    link: n.link,
                }));
            }
            EventPayload::Presence { online_count } => self.set_online_count(online_count),
            EventPayload::Connected { .. } | EventPayload::Heartbeat => {}
        }
    }

    /// Overwrite counters with the server's authoritative totals.
    ///
    /// Frames stamped at or before `counts.counted_through` arrive after this
    /// read without bumping the counters again.
    pub fn reconcile_unread(&mut self, counts: UnreadCounts) {
        self.counted_through = self.counted_through.max(counts.counted_through);
        self.chats = counts.chats;
        self.unread = UnreadState {
            messages: counts.messages,
            notifications: counts.notifications,
        };
        if let Some(scope) = self.open_pane.clone() {
            self.clear_chat(&scope);
        }
        self.emit_unread();
    }

    /// Online count from the presence read or a presence frame.
    pub fn set_online_count(&mut self, online_count: u64) {
        if self.online_count != Some(online_count) {
            self.online_count = Some(online_count);
            self.bus.emit(UiEvent::OnlineCount(online_count));
        }
    }

    /// Pre-seed dedup with recently stored notifications so a replay of
    /// something already counted is not counted again.
    pub fn seed(&mut self, notifications: &[NotificationView]) {
        for view in notifications.iter().rev() {
            self.dedup.insert(&view.event_id);
        }
    }

    // -----------------------------------------------------------------------
    // Transport observations
    // -----------------------------------------------------------------------

    pub fn on_stream_error(&mut self, now: Instant) {
        self.drive(|t| t.on_stream_error(now));
    }

    /// Fire every deadline that has passed.
    pub fn tick(&mut self, now: Instant) {
        self.drive(|t| t.tick(now));

        for key in self.typing.expire(now) {
            self.bus.emit(UiEvent::TypingChanged {
                chat_scope_id: key.chat_scope_id,
                user_id: key.user_id,
                is_typing: false,
            });
        }

        let changes = self.achievements.tick(now);
        self.emit_achievements(changes);

        if self.activity.tick(now) {
            self.effects.push_back(Effect::ReportActivity);
        }
    }

    pub fn next_deadline(&self) -> Instant {
        [
            self.transport.next_deadline(),
            self.typing.next_deadline(),
            self.achievements.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .fold(self.activity.next_deadline(), Instant::min)
    }

    // -----------------------------------------------------------------------
    // User actions
    // -----------------------------------------------------------------------

    pub fn open_pane(&mut self, chat_scope_id: &str) {
        self.open_pane = Some(chat_scope_id.to_string());
        self.pane_messages.clear();
        if self.clear_chat(chat_scope_id) {
            self.emit_unread();
        }
        self.effects.push_back(Effect::MarkRead {
            chat_scope_id: Some(chat_scope_id.to_string()),
        });
    }

    pub fn close_pane(&mut self) {
        self.open_pane = None;
        self.pane_messages.clear();
    }

    pub fn mark_notifications_read(&mut self) {
        if self.unread.notifications > 0 {
            self.unread.notifications = 0;
            self.emit_unread();
        }
        self.effects.push_back(Effect::MarkRead {
            chat_scope_id: None,
        });
    }

    pub fn dismiss_achievement(&mut self, now: Instant) {
        let changes = self.achievements.dismiss(now);
        self.emit_achievements(changes);
    }

    pub fn interaction(&mut self, now: Instant) {
        if self.activity.on_interaction(now) {
            self.effects.push_back(Effect::ReportActivity);
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn take_effects(&mut self) -> Vec<Effect> {
        self.effects.drain(..).collect()
    }

    pub fn unread(&self) -> &UnreadState {
        &self.unread
    }

    pub fn chat_unread(&self, chat_scope_id: &str) -> u32 {
        self.chats.get(chat_scope_id).copied().unwrap_or(0)
    }

    pub fn pane_messages(&self) -> &[MessagePayload] {
        &self.pane_messages
    }

    pub fn online_count(&self) -> Option<u64> {
        self.online_count
    }

    pub fn transport_mode(&self) -> TransportMode {
        self.transport.mode()
    }

    pub fn stream_attempts(&self) -> u32 {
        self.transport.stream_attempts()
    }

    pub fn is_typing(&self, chat_scope_id: &str, user_id: &str) -> bool {
        self.typing.is_typing(chat_scope_id, user_id)
    }

    pub fn achievements(&self) -> &AchievementQueue {
        &self.achievements
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.last_event_at
    }

    // -----------------------------------------------------------------------

    /// Run a transport transition, translate its commands and report a mode
    /// change.
    fn drive(&mut self, step: impl FnOnce(&mut TransportMachine) -> Vec<Command>) {
        let before = self.transport.mode();
        for command in step(&mut self.transport) {
            match command {
                Command::OpenStream => self.effects.push_back(Effect::OpenStream),
                Command::CloseStream => self.effects.push_back(Effect::CloseStream),
                Command::Poll => {
                    self.effects.push_back(Effect::Poll {
                        since: self.last_event_at,
                    });
                    self.effects.push_back(Effect::ReadPresence);
                }
                Command::ReconcileUnread => self.effects.push_back(Effect::ReconcileUnread),
            }
        }
        let after = self.transport.mode();
        if after != before {
            self.bus.emit(UiEvent::TransportChanged(after));
        }
    }

    fn clear_chat(&mut self, chat_scope_id: &str) -> bool {
        match self.chats.remove(chat_scope_id) {
            Some(count) if count > 0 => {
                self.unread.messages = self.unread.messages.saturating_sub(count);
                true
            }
            _ => false,
        }
    }

    fn count_notification(&mut self, counted: bool) {
        if !counted {
            self.unread.notifications += 1;
            self.emit_unread();
        }
    }

    fn emit_unread(&self) {
        self.bus.emit(UiEvent::UnreadChanged(self.unread.clone()));
    }

    fn emit_achievements(&self, changes: Vec<AchievementChange>) {
        for change in changes {
            self.bus.emit(match change {
                AchievementChange::Shown(badge) => UiEvent::AchievementShown(badge),
                AchievementChange::Dismissed { badge_id } => {
                    UiEvent::AchievementDismissed { badge_id }
                }
            });
        }
    }
}
