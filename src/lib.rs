//! Tickpoll - a lightweight in-process task scheduler
//!
//! Tasks are registered with a `Scheduler` whose tick loop launches whatever
//! is due. A `Poller` sits on top and keeps a set of recurring polls inside a
//! per-minute quota, sharing the spare budget evenly among polls that did not
//! ask for a fixed interval.

pub mod domain;
pub mod error;
pub mod id;
pub mod poller;
pub mod scheduler;

pub use error::{Result, TickpollError};
