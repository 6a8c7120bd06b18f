//! Quota-aware poll allocation.
//!
//! - **quota**: pure per-minute budget arithmetic
//! - **Poller**: registry of polls that admits batches all-or-nothing and keeps
//!   every flooding poll on the fair-share interval

pub mod quota;
mod polls;

pub use polls::{DEFAULT_RATE_PER_MIN, Poller, PollerConfig};
