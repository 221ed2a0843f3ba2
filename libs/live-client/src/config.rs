use std::time::Duration;

/// Client-side timing and sizing constants.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Consecutive stream failures before switching to polling for good.
    pub failure_threshold: u32,
    /// A stream that has not sent `connected` within this window has failed.
    pub connect_timeout: Duration,
    /// Fixed delay before reopening a failed stream.
    pub reconnect_delay: Duration,
    /// Poll cadence once degraded.
    pub poll_interval: Duration,
    /// Skip the stream entirely (environment known to block it).
    pub force_polling: bool,
    /// Recently seen event ids kept for dedup.
    pub dedup_capacity: usize,
    /// A typing indicator with no refresh clears after this long.
    pub typing_timeout: Duration,
    pub achievement_display: Duration,
    /// Pause between one achievement leaving and the next appearing.
    pub achievement_gap: Duration,
    pub activity_interval: Duration,
    pub activity_debounce: Duration,
    /// Rows fetched by the cold-start notifications read.
    pub seed_limit: usize,
    /// Timeout on each JSON request.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(3),
            poll_interval: Duration::from_secs(5),
            force_polling: false,
            dedup_capacity: 100,
            typing_timeout: Duration::from_secs(3),
            achievement_display: Duration::from_secs(5),
            achievement_gap: Duration::from_millis(750),
            activity_interval: Duration::from_secs(4 * 60),
            activity_debounce: Duration::from_secs(30),
            seed_limit: 50,
            request_timeout: Duration::from_secs(10),
        }
    }
}
