//! ID, clock, and randomness utilities for tickpoll
//!
//! Provides task id generation, the millisecond clock every timing field is
//! expressed in, and the bounded random integer used for start-time jitter.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tokio::time::Instant;

static CLOCK_ANCHOR: OnceLock<(u64, std::time::Instant)> = OnceLock::new();
static TASK_COUNTER: AtomicU64 = AtomicU64::new(0);

fn system_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Get current timestamp in milliseconds since Unix epoch
///
/// The wall clock is sampled once; after that time advances with tokio's
/// monotonic clock, so tests running on a paused runtime observe virtual time.
pub fn now_ms() -> u64 {
    let (wall_ms, anchor) = *CLOCK_ANCHOR.get_or_init(|| (system_ms(), std::time::Instant::now()));
    let elapsed = Instant::now().into_std().saturating_duration_since(anchor);
    wall_ms + elapsed.as_millis() as u64
}

/// Generate a unique task ID
///
/// Format: `task-{timestamp_ms}-{random_hex}-{counter_hex}`
/// Example: `task-1738300800123-a1b2-0`
pub fn generate_task_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    let counter = TASK_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("task-{}-{:04x}-{:x}", timestamp, random, counter)
}

/// Uniform random integer in `[min, max)`
///
/// Returns `min` when the range is empty.
pub fn random_in_range(min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    rand::rng().random_range(min..max)
}
