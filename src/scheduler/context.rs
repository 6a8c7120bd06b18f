//! Scheduler context - the explicit replacement for a process-wide scheduler
//!
//! Constructed once at program start and handed to everything that needs to
//! schedule work.

use std::sync::Arc;

use crate::poller::{Poller, PollerConfig};
use crate::scheduler::config::SchedulerConfig;
use crate::scheduler::engine::Scheduler;
use crate::scheduler::stats::SchedulerStats;

/// A scheduler together with the statistics observing it
#[derive(Debug, Clone)]
pub struct SchedulerContext {
    /// Task registry and tick loop
    pub scheduler: Scheduler,
    /// Lifecycle counters attached to `scheduler`
    pub stats: Arc<SchedulerStats>,
}

impl SchedulerContext {
    /// Create a context with stats attached. The tick loop is not started.
    pub fn new(config: SchedulerConfig) -> Self {
        let scheduler = Scheduler::new(config);
        let stats = SchedulerStats::attach(&scheduler);
        Self { scheduler, stats }
    }

    /// Start the tick loop on the current tokio runtime
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Build a poller that registers its polls with this context's scheduler
    pub fn poller(&self, config: PollerConfig) -> Poller {
        Poller::new(self.scheduler.clone(), config)
    }

    /// Stop the tick loop and drop every task
    pub fn shutdown(&self) {
        self.scheduler.destroy();
    }
}

impl Default for SchedulerContext {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
