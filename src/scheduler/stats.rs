//! Scheduler statistics
//!
//! A passive observer that tallies lifecycle events. It performs no
//! scheduling logic of its own.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::domain::{SchedulerEvent, TaskId};
use crate::scheduler::engine::{Scheduler, SchedulerObserver};

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Registered tasks waiting for their next run
    pub idle: usize,
    /// Attempts currently in flight
    pub running: usize,
    /// Tasks that reached a terminal state
    pub completed: u64,
    /// Attempts that succeeded
    pub successful_runs: u64,
    /// Attempts that failed
    pub failed_runs: u64,
}

impl StatsSnapshot {
    pub fn total(&self) -> usize {
        self.idle + self.running
    }

    pub fn total_runs(&self) -> u64 {
        self.successful_runs + self.failed_runs
    }
}

/// Where a registered task is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Idle,
    Running,
}

#[derive(Debug, Default)]
struct StatsState {
    counters: StatsSnapshot,
    /// Registered tasks; attempts of unregistered tasks only count as runs
    tasks: HashMap<TaskId, Slot>,
}

impl StatsState {
    fn move_to(&mut self, id: &str, from: Slot, to: Slot) {
        let Some(slot) = self.tasks.get_mut(id) else {
            return;
        };
        if *slot != from {
            return;
        }
        *slot = to;
        let c = &mut self.counters;
        match to {
            Slot::Running => {
                c.idle = c.idle.saturating_sub(1);
                c.running += 1;
            }
            Slot::Idle => {
                c.running = c.running.saturating_sub(1);
                c.idle += 1;
            }
        }
    }
}

/// Event-driven counters for a scheduler
#[derive(Debug, Default)]
pub struct SchedulerStats {
    state: Mutex<StatsState>,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create stats and register them as an observer of `scheduler`
    pub fn attach(scheduler: &Scheduler) -> Arc<Self> {
        let stats = Arc::new(Self::new());
        scheduler.add_observer(stats.clone());
        stats
    }

    fn state(&self) -> MutexGuard<'_, StatsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.state().counters
    }

    pub fn idle(&self) -> usize {
        self.state().counters.idle
    }

    pub fn running(&self) -> usize {
        self.state().counters.running
    }

    pub fn completed(&self) -> u64 {
        self.state().counters.completed
    }

    pub fn successful_runs(&self) -> u64 {
        self.state().counters.successful_runs
    }

    pub fn failed_runs(&self) -> u64 {
        self.state().counters.failed_runs
    }

    pub fn total(&self) -> usize {
        self.snapshot().total()
    }

    pub fn total_runs(&self) -> u64 {
        self.snapshot().total_runs()
    }

    /// Zero every counter and forget every registered task
    pub fn reset(&self) {
        *self.state() = StatsState::default();
    }

    fn record(&self, event: &SchedulerEvent) {
        let mut guard = self.state();
        let state = &mut *guard;
        match event {
            SchedulerEvent::TaskAdded { id } => {
                if let Entry::Vacant(entry) = state.tasks.entry(id.clone()) {
                    entry.insert(Slot::Idle);
                    state.counters.idle += 1;
                }
            }
            SchedulerEvent::TaskRemoved { id, .. } => match state.tasks.remove(id) {
                Some(Slot::Idle) => state.counters.idle = state.counters.idle.saturating_sub(1),
                Some(Slot::Running) => state.counters.running = state.counters.running.saturating_sub(1),
                None => {}
            },
            SchedulerEvent::TaskLaunched { id } => state.move_to(id, Slot::Idle, Slot::Running),
            // the attempt is over; a still registered task waits for its next run
            SchedulerEvent::TaskSuccess { id, .. } => {
                state.counters.successful_runs += 1;
                state.move_to(id, Slot::Running, Slot::Idle);
            }
            SchedulerEvent::TaskFailed { id, .. } => {
                state.counters.failed_runs += 1;
                state.move_to(id, Slot::Running, Slot::Idle);
            }
            SchedulerEvent::TaskCompleted { .. } => state.counters.completed += 1,
            SchedulerEvent::Error { .. } => {}
        }
    }
}

impl SchedulerObserver for SchedulerStats {
    fn on_event(&self, event: &SchedulerEvent) {
        self.record(event);
    }
}
