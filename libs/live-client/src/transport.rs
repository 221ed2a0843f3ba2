//! Transport selection: stream first, poll after repeated failures.
//!
//! ```text
//! Connecting -> Streaming -> (failure -> Reconnecting -> Connecting) | Polling
//! ```
//!
//! The machine does no IO. Callers feed it observations and the current time
//! and carry out the [`Command`]s it returns. Every timer is a deadline held
//! in the current state, so leaving a state cancels its timer.

use std::time::{Duration, Instant};

use crate::config::ClientConfig;

/// Side effects requested by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    OpenStream,
    CloseStream,
    Poll,
    /// Re-read authoritative unread counts.
    ReconcileUnread,
}

/// Coarse view of the current transport, for UI and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Idle,
    Connecting,
    Streaming,
    Reconnecting,
    Polling,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Connecting { deadline: Instant },
    Streaming { stale_at: Option<Instant> },
    Reconnecting { at: Instant },
    Polling { next_poll: Instant },
    Stopped,
}

#[derive(Debug)]
pub struct TransportMachine {
    state: State,
    failures: u32,
    stream_attempts: u32,
    failure_threshold: u32,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    poll_interval: Duration,
    force_polling: bool,
    /// Silence on an open stream longer than this is a failure.
    stall_after: Option<Duration>,
}

impl TransportMachine {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            state: State::Idle,
            failures: 0,
            stream_attempts: 0,
            failure_threshold: config.failure_threshold.max(1),
            connect_timeout: config.connect_timeout,
            reconnect_delay: config.reconnect_delay,
            poll_interval: config.poll_interval,
            force_polling: config.force_polling,
            stall_after: None,
        }
    }

    pub fn start(&mut self, now: Instant) -> Vec<Command> {
        if self.state != State::Idle {
            return Vec::new();
        }
        if self.force_polling {
            return self.enter_polling(now);
        }
        self.connect(now)
    }

    /// The server's `connected` frame arrived on the current stream.
    pub fn on_connected(&mut self, heartbeat_interval: Duration, now: Instant) -> Vec<Command> {
        match self.state {
            State::Connecting { .. } => {
                self.failures = 0;
                self.stall_after = (!heartbeat_interval.is_zero()).then(|| heartbeat_interval * 2);
                self.state = State::Streaming {
                    stale_at: self.stall_after.map(|d| now + d),
                };
                vec![Command::ReconcileUnread]
            }
            State::Streaming { .. } => {
                self.on_frame(now);
                Vec::new()
            }
            // A stream finishing its handshake after we gave up on it.
            _ => vec![Command::CloseStream],
        }
    }

    /// Any frame arrived on the open stream.
    pub fn on_frame(&mut self, now: Instant) {
        if let State::Streaming { stale_at } = &mut self.state {
            *stale_at = self.stall_after.map(|d| now + d);
        }
    }

    /// Stream open failed, errored or ended.
    pub fn on_stream_error(&mut self, now: Instant) -> Vec<Command> {
        match self.state {
            State::Connecting { .. } | State::Streaming { .. } => self.fail(now),
            _ => Vec::new(),
        }
    }

    pub fn tick(&mut self, now: Instant) -> Vec<Command> {
        match self.state {
            State::Connecting { deadline } if deadline <= now => self.fail(now),
            State::Streaming {
                stale_at: Some(stale_at),
            } if stale_at <= now => self.fail(now),
            State::Reconnecting { at } if at <= now => self.connect(now),
            State::Polling { next_poll } if next_poll <= now => {
                self.state = State::Polling {
                    next_poll: now + self.poll_interval,
                };
                vec![Command::Poll]
            }
            _ => Vec::new(),
        }
    }

    pub fn stop(&mut self) -> Vec<Command> {
        let was_streaming = matches!(
            self.state,
            State::Connecting { .. } | State::Streaming { .. }
        );
        self.state = State::Stopped;
        if was_streaming {
            vec![Command::CloseStream]
        } else {
            Vec::new()
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            State::Connecting { deadline } => Some(deadline),
            State::Streaming { stale_at } => stale_at,
            State::Reconnecting { at } => Some(at),
            State::Polling { next_poll } => Some(next_poll),
            State::Idle | State::Stopped => None,
        }
    }

    pub fn mode(&self) -> TransportMode {
        match self.state {
            State::Idle => TransportMode::Idle,
            State::Connecting { .. } => TransportMode::Connecting,
            State::Streaming { .. } => TransportMode::Streaming,
            State::Reconnecting { .. } => TransportMode::Reconnecting,
            State::Polling { .. } => TransportMode::Polling,
            State::Stopped => TransportMode::Stopped,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Stream opens requested so far in this session.
    pub fn stream_attempts(&self) -> u32 {
        self.stream_attempts
    }

    fn connect(&mut self, now: Instant) -> Vec<Command> {
        self.stream_attempts += 1;
        self.state = State::Connecting {
            deadline: now + self.connect_timeout,
        };
        vec![Command::OpenStream]
    }

    fn fail(&mut self, now: Instant) -> Vec<Command> {
        self.failures += 1;
        tracing::debug!(failures = self.failures, "stream failure");
        if self.failures >= self.failure_threshold {
            tracing::info!(failures = self.failures, "switching to polling");
            let mut commands = vec![Command::CloseStream];
            commands.extend(self.enter_polling(now));
            return commands;
        }
        self.state = State::Reconnecting {
            at: now + self.reconnect_delay,
        };
        vec![Command::CloseStream]
    }

    fn enter_polling(&mut self, now: Instant) -> Vec<Command> {
        self.state = State::Polling {
            next_poll: now + self.poll_interval,
        };
        // Apply the buffered backlog before the authoritative read so the
        // read has the last word on counters.
        vec![Command::Poll, Command::ReconcileUnread]
    }
}
