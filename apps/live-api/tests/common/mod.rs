#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures_util::StreamExt;
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Event, EventSource};

use bazaar_common::Frame;
use live_api::config::Config;
use live_api::db::kv::{KeyValueStore, MemoryStore};
use live_api::db::notifications::{MemoryNotificationStore, NotificationStore};
use live_api::AppState;

/// Config with short timers so stream tests finish quickly.
pub fn test_config() -> Config {
    Config {
        port: 0,
        heartbeat_interval: Duration::from_millis(200),
        idle_timeout: Duration::from_secs(2),
        sweep_interval: Duration::from_millis(200),
        presence_tick: Duration::from_millis(200),
        ..Config::default()
    }
}

/// Build a test AppState with in-memory stores.
pub fn test_state_with(config: Config) -> AppState {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let notifications: Arc<dyn NotificationStore> = Arc::new(MemoryNotificationStore::new());
    AppState::new(config, kv, notifications)
}

pub fn test_state() -> AppState {
    test_state_with(test_config())
}

/// Build the full application router wired to the test state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = live_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Mint an access token for `user_id`, as the auth service would.
pub async fn issue_token(state: &AppState, user_id: &str) -> String {
    live_api::auth::tokens::issue_access_token(state.kv.as_ref(), user_id)
        .await
        .expect("issue token")
}

pub fn new_user_id() -> String {
    bazaar_common::id::prefixed_ulid(bazaar_common::id::prefix::USER)
}

/// Start a real TCP server for stream testing. The server runs in the
/// background for the rest of the test.
pub async fn start_server(state: AppState) -> SocketAddr {
    let app = live_api::routes::router().with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// An open event stream read frame by frame.
pub struct StreamReader {
    source: EventSource,
}

impl StreamReader {
    /// Connect and wait for the response head. The event source rejects a
    /// non-2xx status or a content type other than `text/event-stream`.
    pub async fn open(addr: SocketAddr, token: &str) -> Self {
        let request = reqwest::Client::new()
            .get(format!("http://{addr}/api/v1/stream"))
            .query(&[("token", token)]);
        let mut source = EventSource::new(request).expect("cloneable request");
        source.set_retry_policy(Box::new(Never));
        match source.next().await {
            Some(Ok(Event::Open)) => {}
            other => panic!("stream did not open: {other:?}"),
        }
        Self { source }
    }

    /// Next frame, or `None` if the stream ended or nothing arrived in time.
    pub async fn next_frame(&mut self, within: Duration) -> Option<Frame> {
        tokio::time::timeout(within, async {
            loop {
                match self.source.next().await? {
                    Ok(Event::Message(message)) => {
                        return Some(serde_json::from_str::<Frame>(&message.data).expect("valid frame"));
                    }
                    Ok(Event::Open) => continue,
                    Err(_) => return None,
                }
            }
        })
        .await
        .ok()
        .flatten()
    }

    /// Skip liveness frames until a non-liveness frame arrives.
    pub async fn next_event(&mut self, within: Duration) -> Option<Frame> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            let frame = self.next_frame(left).await?;
            if !frame.kind().is_liveness() {
                return Some(frame);
            }
        }
    }
}

/// Poll until `check` holds or `within` elapses.
pub async fn eventually<F: FnMut() -> bool>(within: Duration, mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
