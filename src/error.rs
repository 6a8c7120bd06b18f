//! Error types for tickpoll
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in tickpoll
///
/// Errors are `Clone` because a single task failure is delivered to the task's
/// failure callback, to scheduler observers, and to whoever awaits the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickpollError {
    /// `run()` was called on a task that is not idle
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The task's callable returned an error
    #[error("Task failed: {0}")]
    TaskFailure(String),

    /// Aggregate poll demand exceeds the configured per-minute ceiling
    #[error("poller quota of {rate_per_min}/min exceeded by {overage}/min")]
    QuotaExceeded { rate_per_min: f64, overage: f64 },

    /// Task id not present in the scheduler registry
    #[error("no such task: {0}")]
    UnknownTask(String),

    /// The task was removed before it reached a terminal outcome
    #[error("Task cancelled: {0}")]
    Cancelled(String),
}

impl TickpollError {
    /// Shorthand for a task failure with the given message
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::TaskFailure(msg.into())
    }
}

/// Result type alias for tickpoll operations
pub type Result<T> = std::result::Result<T, TickpollError>;
