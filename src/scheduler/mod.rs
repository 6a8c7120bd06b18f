//! Scheduler module for dispatching deferred work on a fixed tick.
//!
//! This module provides:
//! - **Scheduler**: Registry of tasks plus the tick loop that launches due ones.
//! - **Registry**: Insertion-ordered id -> task map.
//! - **Stats**: Counters fed by scheduler lifecycle events.
//! - **Context**: The scheduler and its stats, constructed once and passed around.
//!
//! # Architecture
//!
//! The scheduler uses a polling model:
//! 1. Callers register tasks (directly or through a `Poller`)
//! 2. Every tick scans the registry in insertion order
//! 3. Due tasks are launched as independent tokio tasks
//! 4. Outcomes are reported to observers as `SchedulerEvent`s
//!
//! # Example
//!
//! ```ignore
//! use tickpoll::domain::{TaskFn, TimeUnit};
//! use tickpoll::scheduler::{SchedulerConfig, SchedulerContext};
//!
//! let ctx = SchedulerContext::new(SchedulerConfig::default());
//! ctx.start();
//! ctx.scheduler.run_every(TaskFn::sync(|_| Ok(serde_json::Value::Null)), 5, TimeUnit::Second, 0u32);
//! ```

mod config;
mod context;
mod engine;
mod registry;
mod stats;

pub use config::{DEFAULT_JITTER_MAX_MS, DEFAULT_JITTER_MIN_MS, DEFAULT_TICK_INTERVAL_MS, SchedulerConfig};
pub use context::SchedulerContext;
pub use engine::{Scheduler, SchedulerObserver};
pub use registry::TaskRegistry;
pub use stats::{SchedulerStats, StatsSnapshot};
