//! Time-ordered numeric ids for stored rows.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 2026-01-01T00:00:00Z in ms since the Unix epoch.
const BAZAAR_EPOCH_MS: u64 = 1_767_225_600_000;
const SEQUENCE_BITS: u32 = 12;

/// Lock-free generator of `(ms since the Bazaar epoch << 12) | sequence` ids.
///
/// Ids from one generator are strictly increasing, so sorting notifications by
/// id gives creation order. More than 4096 ids in one millisecond borrow from
/// the next millisecond instead of spinning, and a clock that steps backwards
/// is treated as standing still.
pub struct SnowflakeGenerator {
    last: AtomicU64,
}

impl SnowflakeGenerator {
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    pub fn generate(&self) -> i64 {
        let floor = current_ms().saturating_sub(BAZAAR_EPOCH_MS) << SEQUENCE_BITS;
        let prev = match self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(floor.max(last + 1))
            }) {
            Ok(prev) | Err(prev) => prev,
        };
        floor.max(prev + 1) as i64
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn current_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Creation time (ms since the Unix epoch) encoded in an id.
pub fn snowflake_timestamp_ms(id: i64) -> u64 {
    ((id as u64) >> SEQUENCE_BITS) + BAZAAR_EPOCH_MS
}
