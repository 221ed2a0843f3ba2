//! Tokio driver for the [`Reconciler`].
//!
//! One task owns the reconciler and performs its effects. The open stream
//! runs in a child task that forwards `data` payloads tagged with its attempt
//! number, so output from a stream that has since been replaced is ignored.
//! Reconnects are decided by the reconciler, never by the event source.

use std::time::Instant;

use futures_util::StreamExt;
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Event, EventSource};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::api::LiveApi;
use crate::config::ClientConfig;
use crate::reconciler::{Effect, Reconciler};
use crate::transport::TransportMode;
use crate::ui::{UiBus, UnreadState};

/// Point-in-time view of the driver, mainly for tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSnapshot {
    pub mode: TransportMode,
    pub unread: UnreadState,
    pub stream_attempts: u32,
    pub online_count: Option<u64>,
}

enum Control {
    OpenPane(String),
    ClosePane,
    Interaction,
    DismissAchievement,
    MarkNotificationsRead,
    Snapshot(oneshot::Sender<ClientSnapshot>),
    Shutdown,
}

struct StreamMsg {
    attempt: u64,
    data: Option<String>,
}

pub struct LiveClient {
    api: LiveApi,
    config: ClientConfig,
    bus: UiBus,
}

impl LiveClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, config: ClientConfig, bus: UiBus) -> Self {
        let api = LiveApi::new(base_url, token, config.request_timeout);
        Self { api, config, bus }
    }

    pub fn spawn(self) -> LiveHandle {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Driver::new(self).run(control_rx));
        LiveHandle {
            control: control_tx,
            task: Some(task),
        }
    }
}

/// Controls a running client. Dropping the handle stops the client and
/// cancels every timer and request it owns.
pub struct LiveHandle {
    control: mpsc::UnboundedSender<Control>,
    task: Option<JoinHandle<()>>,
}

impl LiveHandle {
    pub fn open_pane(&self, chat_scope_id: impl Into<String>) {
        let _ = self.control.send(Control::OpenPane(chat_scope_id.into()));
    }

    pub fn close_pane(&self) {
        let _ = self.control.send(Control::ClosePane);
    }

    pub fn interaction(&self) {
        let _ = self.control.send(Control::Interaction);
    }

    pub fn dismiss_achievement(&self) {
        let _ = self.control.send(Control::DismissAchievement);
    }

    pub fn mark_notifications_read(&self) {
        let _ = self.control.send(Control::MarkNotificationsRead);
    }

    /// `None` once the client has stopped.
    pub async fn snapshot(&self) -> Option<ClientSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.control.send(Control::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    pub async fn shutdown(mut self) {
        let _ = self.control.send(Control::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Aborts the stream task when replaced or dropped.
struct StreamTask(JoinHandle<()>);

impl Drop for StreamTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Driver {
    api: LiveApi,
    config: ClientConfig,
    reconciler: Reconciler,
    stream: Option<StreamTask>,
    attempt: u64,
    frames_tx: mpsc::Sender<StreamMsg>,
    frames_rx: mpsc::Receiver<StreamMsg>,
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl Driver {
    fn new(client: LiveClient) -> Self {
        let (frames_tx, frames_rx) = mpsc::channel(64);
        Self {
            reconciler: Reconciler::new(&client.config, client.bus, now()),
            api: client.api,
            config: client.config,
            stream: None,
            attempt: 0,
            frames_tx,
            frames_rx,
        }
    }

    async fn run(mut self, mut control_rx: mpsc::UnboundedReceiver<Control>) {
        self.cold_start().await;
        self.reconciler.start(now());

        loop {
            self.perform_effects().await;
            if self.reconciler.transport_mode() == TransportMode::Stopped {
                break;
            }

            let deadline = tokio::time::Instant::from_std(self.reconciler.next_deadline());
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => self.reconciler.tick(now()),
                Some(msg) = self.frames_rx.recv() => {
                    if msg.attempt != self.attempt || self.stream.is_none() {
                        continue;
                    }
                    match msg.data {
                        Some(data) => {
                            self.reconciler.apply_raw(&data, now());
                        }
                        None => {
                            self.stream = None;
                            self.reconciler.on_stream_error(now());
                        }
                    }
                }
                control = control_rx.recv() => match control {
                    Some(Control::OpenPane(scope)) => self.reconciler.open_pane(&scope),
                    Some(Control::ClosePane) => self.reconciler.close_pane(),
                    Some(Control::Interaction) => self.reconciler.interaction(now()),
                    Some(Control::DismissAchievement) => self.reconciler.dismiss_achievement(now()),
                    Some(Control::MarkNotificationsRead) => self.reconciler.mark_notifications_read(),
                    Some(Control::Snapshot(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(Control::Shutdown) | None => self.reconciler.stop(),
                },
            }
        }

        self.stream = None;
        tracing::debug!("live client stopped");
    }

    /// Counters and dedup seed before any live frame is applied.
    async fn cold_start(&mut self) {
        match self.api.recent_notifications(self.config.seed_limit).await {
            Ok(res) => self.reconciler.seed(&res.notifications),
            Err(err) => tracing::warn!(%err, "cold-start notifications read failed"),
        }
        self.reconcile_unread().await;
    }

    async fn reconcile_unread(&mut self) {
        match self.api.unread_counts().await {
            Ok(counts) => self.reconciler.reconcile_unread(counts),
            Err(err) => tracing::warn!(%err, "unread-count read failed"),
        }
    }

    async fn perform_effects(&mut self) {
        loop {
            let effects = self.reconciler.take_effects();
            if effects.is_empty() {
                return;
            }
            for effect in effects {
                self.perform(effect).await;
            }
        }
    }

    async fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::OpenStream => self.open_stream(),
            Effect::CloseStream => self.stream = None,
            Effect::Poll { since } => match self.api.poll(since).await {
                Ok(events) => {
                    let at = now();
                    for value in events {
                        self.reconciler.apply_value(value, at);
                    }
                }
                // Skip this tick; the next one retries.
                Err(err) => tracing::warn!(%err, "poll failed"),
            },
            Effect::ReadPresence => match self.api.presence().await {
                Ok(snapshot) => self.reconciler.set_online_count(snapshot.online_count),
                Err(err) => tracing::debug!(%err, "presence read failed"),
            },
            Effect::ReconcileUnread => self.reconcile_unread().await,
            Effect::MarkRead { chat_scope_id } => {
                if let Err(err) = self.api.mark_read(chat_scope_id).await {
                    tracing::warn!(%err, "mark-read failed");
                }
            }
            Effect::ReportActivity => {
                if let Err(err) = self.api.report_activity().await {
                    tracing::debug!(%err, "activity report failed");
                }
            }
        }
    }

    fn open_stream(&mut self) {
        self.attempt += 1;
        let attempt = self.attempt;
        let api = self.api.clone();
        let tx = self.frames_tx.clone();
        tracing::debug!(attempt, "opening stream");

        self.stream = Some(StreamTask(tokio::spawn(async move {
            match EventSource::new(api.stream_request()) {
                Ok(mut source) => {
                    source.set_retry_policy(Box::new(Never));
                    while let Some(event) = source.next().await {
                        match event {
                            Ok(Event::Open) => tracing::debug!(attempt, "stream opened"),
                            Ok(Event::Message(message)) => {
                                let msg = StreamMsg {
                                    attempt,
                                    data: Some(message.data),
                                };
                                if tx.send(msg).await.is_err() {
                                    return;
                                }
                            }
                            Err(err) => {
                                tracing::debug!(attempt, %err, "stream failed");
                                break;
                            }
                        }
                    }
                    source.close();
                }
                Err(err) => tracing::debug!(attempt, %err, "stream request not cloneable"),
            }
            let _ = tx.send(StreamMsg { attempt, data: None }).await;
        })));
    }

    fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            mode: self.reconciler.transport_mode(),
            unread: self.reconciler.unread().clone(),
            stream_attempts: self.reconciler.stream_attempts(),
            online_count: self.reconciler.online_count(),
        }
    }
}
