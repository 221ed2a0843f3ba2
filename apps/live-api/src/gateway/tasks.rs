//! Long-running maintenance loops: idle sweep, presence broadcast and poll
//! buffer pruning.

use std::time::{Duration, Instant};

use bazaar_common::EventPayload;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use crate::AppState;

/// Handle to the spawned loops. Dropping it aborts them.
pub struct BackgroundTasks {
    shutdown_tx: broadcast::Sender<()>,
    tasks: JoinSet<()>,
}

impl BackgroundTasks {
    pub fn spawn(state: &AppState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut tasks = JoinSet::new();

        tasks.spawn(sweep_idle(state.clone(), shutdown_tx.subscribe()));
        tasks.spawn(broadcast_presence(state.clone(), shutdown_tx.subscribe()));
        tasks.spawn(prune_buffers(state.clone(), shutdown_tx.subscribe()));

        Self { shutdown_tx, tasks }
    }

    /// Signal every loop to stop and wait for them to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        while self.tasks.join_next().await.is_some() {}
        tracing::info!("background tasks stopped");
    }
}

fn ticker(period: Duration) -> time::Interval {
    let mut interval = time::interval_at(time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn sweep_idle(state: AppState, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut interval = ticker(state.config.sweep_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = state
                    .registry
                    .sweep_idle(Instant::now(), state.config.idle_timeout);
                if removed > 0 {
                    tracing::info!(removed, remaining = state.registry.len(), "swept idle streams");
                }
            }
            _ = shutdown_rx.recv() => return,
        }
    }
}

async fn broadcast_presence(state: AppState, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut interval = ticker(state.config.presence_tick);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let online_count = state
                    .presence
                    .recompute(Instant::now(), state.config.presence_window);
                let outcome = state.publisher.broadcast(EventPayload::Presence { online_count });
                tracing::debug!(online_count, delivered = outcome.delivered, "presence broadcast");
            }
            _ = shutdown_rx.recv() => return,
        }
    }
}

async fn prune_buffers(state: AppState, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut interval = ticker(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = state.buffer.prune(Utc::now());
                if removed > 0 {
                    tracing::debug!(removed, "pruned poll buffers");
                }
            }
            _ = shutdown_rx.recv() => return,
        }
    }
}
