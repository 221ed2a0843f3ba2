//! Event-stream handler and per-connection frame loop.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::header::HeaderName;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bazaar_common::id::{prefix, prefixed_ulid};
use bazaar_common::Frame;
use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::auth::middleware::StreamAuth;
use crate::error::ApiError;
use crate::AppState;

use super::connection::{Connection, QueuedFrame};
use super::registry::ConnectionRegistry;

/// Proxies that honour this header stop buffering the response body.
static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

pub fn router() -> Router<AppState> {
    Router::new().route("/stream", get(open_stream))
}

#[utoipa::path(
    get,
    path = "/api/v1/stream",
    tag = "Live",
    params(
        ("token" = String, Query, description = "Access token"),
    ),
    responses(
        (status = 200, description = "One JSON frame per `data:` line", body = String, content_type = "text/event-stream"),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorBody),
    ),
)]
pub async fn open_stream(
    StreamAuth { user_id }: StreamAuth,
    State(state): State<AppState>,
) -> Response {
    let connection_id = prefixed_ulid(prefix::CONNECTION);
    let (tx, rx) = mpsc::channel(state.config.outbound_capacity);

    let connection = match state.registry.register(&user_id, &connection_id, tx) {
        Ok(connection) => connection,
        Err(err) => {
            tracing::warn!(%user_id, %err, "stream registration failed");
            return ApiError::internal("Could not open stream").into_response();
        }
    };
    state.presence.touch(&user_id, Instant::now());

    tracing::info!(
        connection_id = %connection.connection_id,
        %user_id,
        connections = state.registry.len(),
        "stream opened"
    );

    let heartbeat_interval = state.config.heartbeat_interval;
    let mut heartbeat = time::interval_at(time::Instant::now() + heartbeat_interval, heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let session = StreamSession {
        guard: ConnectionGuard {
            registry: state.registry.clone(),
            connection_id: connection.connection_id.clone(),
        },
        connection,
        rx,
        heartbeat,
        heartbeat_interval,
        write_deadline: state.config.write_deadline,
        greeted: false,
    };

    ([(X_ACCEL_BUFFERING.clone(), "no")], Sse::new(frames(session))).into_response()
}

/// Unregisters the connection when the response body is dropped, which is
/// how a client disconnect surfaces.
struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    connection_id: String,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(connection) = self.registry.unregister(&self.connection_id) {
            tracing::info!(
                connection_id = %connection.connection_id,
                user_id = %connection.user_id,
                "stream closed"
            );
        }
    }
}

struct StreamSession {
    connection: Arc<Connection>,
    rx: mpsc::Receiver<QueuedFrame>,
    heartbeat: time::Interval,
    heartbeat_interval: Duration,
    write_deadline: Duration,
    greeted: bool,
    guard: ConnectionGuard,
}

impl StreamSession {
    /// Next frame to write, or `None` once the connection is finished.
    async fn next_frame(&mut self) -> Option<Arc<Frame>> {
        if !self.greeted {
            self.greeted = true;
            return Some(Arc::new(Frame::connected(
                &self.connection.connection_id,
                self.heartbeat_interval.as_millis() as u64,
            )));
        }

        // Being polled again means the previous frame was handed to the
        // transport.
        if self.connection.mark_open() {
            tracing::debug!(connection_id = %self.connection.connection_id, "stream open");
        }
        self.connection.touch(Instant::now());

        tokio::select! {
            biased;
            queued = self.rx.recv() => {
                let queued = queued?;
                if queued.queued_at.elapsed() > self.write_deadline {
                    tracing::warn!(
                        connection_id = %self.connection.connection_id,
                        user_id = %self.connection.user_id,
                        waited_ms = queued.queued_at.elapsed().as_millis() as u64,
                        "write deadline exceeded, closing slow stream"
                    );
                    return None;
                }
                Some(queued.frame)
            }
            _ = self.heartbeat.tick() => Some(Arc::new(Frame::heartbeat())),
        }
    }
}

fn frames(session: StreamSession) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    stream::unfold(session, |mut session| async move {
        let frame = session.next_frame().await?;
        match serde_json::to_string(frame.as_ref()) {
            Ok(json) => Some((Ok(SseEvent::default().data(json)), session)),
            Err(err) => {
                tracing::error!(
                    connection_id = %session.guard.connection_id,
                    ?err,
                    "frame serialization failed"
                );
                None
            }
        }
    })
}
