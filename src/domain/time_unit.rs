//! Time units used to express task intervals and delays.

use serde::{Deserialize, Serialize};

/// A unit of time, valued in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    /// 30 days
    Month,
    /// 365 days
    Year,
}

impl TimeUnit {
    /// Milliseconds in one unit
    pub const fn millis(self) -> i64 {
        match self {
            TimeUnit::Millisecond => 1,
            TimeUnit::Second => 1_000,
            TimeUnit::Minute => 60_000,
            TimeUnit::Hour => 3_600_000,
            TimeUnit::Day => 86_400_000,
            TimeUnit::Month => 86_400_000 * 30,
            TimeUnit::Year => 86_400_000 * 365,
        }
    }

    /// `amount` of this unit, in milliseconds
    pub fn of(self, amount: i64) -> i64 {
        amount.saturating_mul(self.millis())
    }
}
