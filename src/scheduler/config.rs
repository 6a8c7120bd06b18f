//! Scheduler configuration: tick cadence and start-time jitter.

use std::time::Duration;

/// Default time between registry scans
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 200;
/// Lower bound of the random start delay (inclusive)
pub const DEFAULT_JITTER_MIN_MS: u64 = 100;
/// Upper bound of the random start delay (exclusive)
pub const DEFAULT_JITTER_MAX_MS: u64 = 10_000;

/// Configuration for the scheduler tick loop
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between ticks
    pub tick_interval: Duration,
    /// Spread tasks without an explicit `at` over the jitter window
    pub random_start: bool,
    /// Jitter window lower bound (ms)
    pub jitter_min_ms: u64,
    /// Jitter window upper bound (ms)
    pub jitter_max_ms: u64,
    /// Buffer size of the broadcast event channel
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            random_start: true,
            jitter_min_ms: DEFAULT_JITTER_MIN_MS,
            jitter_max_ms: DEFAULT_JITTER_MAX_MS,
            event_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    /// Create a new scheduler config
    pub fn new(tick_interval: Duration, random_start: bool) -> Self {
        Self {
            tick_interval,
            random_start,
            ..Default::default()
        }
    }

    /// Set the tick interval
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Enable or disable randomized start times
    pub fn with_random_start(mut self, random_start: bool) -> Self {
        self.random_start = random_start;
        self
    }

    /// Set the jitter window `[min_ms, max_ms)`
    pub fn with_jitter(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.jitter_min_ms = min_ms;
        self.jitter_max_ms = max_ms;
        self
    }
}
