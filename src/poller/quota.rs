//! Per-minute quota arithmetic for the poller.
//!
//! Fixed-interval polls consume a known share of the per-minute budget. What
//! is left over is split evenly across the flooding polls by stretching each
//! one's interval by the number of polls sharing it.

use crate::domain::TimeUnit;

const MINUTE_MS: f64 = TimeUnit::Minute.millis() as f64;

/// Shortest interval handed to a flooding poll. An interval of 0 would make
/// the poll one-shot.
pub const MIN_FLOODING_INTERVAL_MS: i64 = 1;

/// Runs per minute produced by a poll with the given interval.
///
/// Negative intervals (one-shot polls) cost nothing; 0 yields infinity.
pub fn rate_per_min_for(interval: i64) -> f64 {
    if interval < 0 { 0.0 } else { MINUTE_MS / interval as f64 }
}

/// Budget left after every fixed-interval poll is paid for. May be negative.
pub fn spare_rate(rate_per_min: f64, fixed_intervals: impl IntoIterator<Item = i64>) -> f64 {
    fixed_intervals
        .into_iter()
        .fold(rate_per_min, |spare, interval| spare - rate_per_min_for(interval))
}

/// Interval that would consume exactly `spare_rate`.
///
/// Rounds toward ceil when negative so an overage keeps its magnitude.
/// A spare rate of exactly 0 yields `i64::MAX`.
pub fn spare_interval(spare_rate: f64) -> i64 {
    let raw = MINUTE_MS / spare_rate;
    let rounded = if spare_rate < 0.0 { raw.ceil() } else { raw.floor() };
    rounded as i64
}

/// Interval each of `flooding_count` polls gets when sharing the spare budget
///
/// Never below `MIN_FLOODING_INTERVAL_MS` while there is budget to share.
pub fn interval_for_flooding(spare_interval: i64, flooding_count: usize) -> i64 {
    if spare_interval < 0 || flooding_count == 0 {
        spare_interval
    } else {
        spare_interval
            .saturating_mul(flooding_count as i64)
            .max(MIN_FLOODING_INTERVAL_MS)
    }
}

/// Overage reported when the computed flooding interval is negative
pub fn overage_for(negative_interval: i64) -> f64 {
    rate_per_min_for(negative_interval.saturating_abs())
}
