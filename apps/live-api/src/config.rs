use std::time::Duration;

/// Live API configuration, loaded from environment variables.
///
/// Every variable is optional; the defaults are sized for a single server
/// instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Interval between `heartbeat` frames on an open stream.
    pub heartbeat_interval: Duration,
    /// A stream with no successful write for this long is swept.
    pub idle_timeout: Duration,
    /// How often the idle sweeper runs.
    pub sweep_interval: Duration,
    /// Longest a queued frame may wait for the client before the connection
    /// is considered too slow and closed.
    pub write_deadline: Duration,
    /// Per-connection outbound queue depth.
    pub outbound_capacity: usize,
    /// Per-user poll buffer depth.
    pub poll_buffer_depth: usize,
    /// Maximum age of an event in the poll buffer.
    pub poll_buffer_ttl: Duration,
    /// Users active within this window count as online.
    pub presence_window: Duration,
    /// How often the online count is recomputed and broadcast.
    pub presence_tick: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4003,
            heartbeat_interval: Duration::from_secs(25),
            idle_timeout: Duration::from_secs(40),
            sweep_interval: Duration::from_secs(10),
            write_deadline: Duration::from_secs(5),
            outbound_capacity: 64,
            poll_buffer_depth: 50,
            poll_buffer_ttl: Duration::from_secs(5 * 60),
            presence_window: Duration::from_secs(5 * 60),
            presence_tick: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// [`Config::default`] for anything unset or unparseable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            port: parsed_var("PORT").unwrap_or(d.port),
            heartbeat_interval: secs_var("HEARTBEAT_INTERVAL_SECS").unwrap_or(d.heartbeat_interval),
            idle_timeout: secs_var("IDLE_TIMEOUT_SECS").unwrap_or(d.idle_timeout),
            sweep_interval: secs_var("SWEEP_INTERVAL_SECS").unwrap_or(d.sweep_interval),
            write_deadline: parsed_var("WRITE_DEADLINE_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.write_deadline),
            outbound_capacity: parsed_var("OUTBOUND_CAPACITY")
                .filter(|n| *n > 0)
                .unwrap_or(d.outbound_capacity),
            poll_buffer_depth: parsed_var("POLL_BUFFER_DEPTH")
                .filter(|n| *n > 0)
                .unwrap_or(d.poll_buffer_depth),
            poll_buffer_ttl: secs_var("POLL_BUFFER_TTL_SECS").unwrap_or(d.poll_buffer_ttl),
            presence_window: secs_var("PRESENCE_WINDOW_SECS").unwrap_or(d.presence_window),
            presence_tick: secs_var("PRESENCE_TICK_SECS").unwrap_or(d.presence_tick),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn secs_var(name: &str) -> Option<Duration> {
    parsed_var::<u64>(name)
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}
