//! Poller: registers recurring polls with a scheduler under a per-minute quota.
//!
//! Polls created with an interval run at that interval. Polls created without
//! one ("flooding" polls) share whatever budget the fixed polls leave, and
//! every flooding poll always carries the same, currently computed interval.
//! Admission is all-or-nothing: if a batch does not fit, every poll from it is
//! rolled back before the quota error is returned.

use std::collections::HashSet;

use crate::domain::{Task, TaskId, TaskRef, TaskSchema};
use crate::error::{Result, TickpollError};
use crate::poller::quota;
use crate::scheduler::{Scheduler, TaskRegistry};

/// Default aggregate ceiling, in runs per minute
pub const DEFAULT_RATE_PER_MIN: f64 = 2000.0;

/// Poller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Ceiling on the summed rate of every poll, in runs per minute
    pub rate_per_min: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            rate_per_min: DEFAULT_RATE_PER_MIN,
        }
    }
}

impl PollerConfig {
    pub fn new(rate_per_min: f64) -> Self {
        Self { rate_per_min }
    }
}

/// Quota-aware registry of recurring polls
#[derive(Debug)]
pub struct Poller {
    scheduler: Scheduler,
    config: PollerConfig,
    polls: TaskRegistry,
    flooding: HashSet<TaskId>,
}

impl Poller {
    pub fn new(scheduler: Scheduler, config: PollerConfig) -> Self {
        Self {
            scheduler,
            config,
            polls: TaskRegistry::new(),
            flooding: HashSet::new(),
        }
    }

    pub fn rate_per_min(&self) -> f64 {
        self.config.rate_per_min
    }

    pub fn rate_per_min_for(&self, interval: i64) -> f64 {
        quota::rate_per_min_for(interval)
    }

    /// Quota left after every fixed-interval poll
    pub fn spare_rate(&self) -> f64 {
        let fixed = self
            .polls
            .iter()
            .filter(|poll| !self.flooding.contains(poll.id()))
            .map(|poll| poll.interval());
        quota::spare_rate(self.config.rate_per_min, fixed)
    }

    pub fn spare_interval(&self) -> i64 {
        quota::spare_interval(self.spare_rate())
    }

    /// Interval every flooding poll should run at; negative means over quota
    pub fn interval_for_flooding_poll(&self) -> i64 {
        quota::interval_for_flooding(self.spare_interval(), self.flooding.len())
    }

    /// All polls in registration order
    pub fn polls(&self) -> Vec<Task> {
        self.polls.iter().cloned().collect()
    }

    pub fn get_poll(&self, id: &str) -> Option<Task> {
        self.polls.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }

    pub fn flooding_count(&self) -> usize {
        self.flooding.len()
    }

    /// Polls not currently registered with the scheduler
    pub fn unscheduled_polls(&self) -> Vec<Task> {
        self.polls
            .iter()
            .filter(|poll| !self.scheduler.contains(poll.id()))
            .cloned()
            .collect()
    }

    /// True if at least one poll is registered with the scheduler
    pub fn is_started(&self) -> bool {
        !self.polls.is_empty() && self.polls.len() > self.unscheduled_polls().len()
    }

    pub fn is_flooding(&self, poll: impl Into<TaskRef>) -> bool {
        self.flooding.contains(poll.into().id())
    }

    pub fn is_scheduled(&self, poll: impl Into<TaskRef>) -> bool {
        self.scheduler.contains(poll.into().id())
    }

    /// Add a single poll and start it. Returns the new poll's id.
    pub fn add_poll(&mut self, schema: TaskSchema) -> Result<TaskId> {
        let id = self.register(schema);
        self.admit(std::slice::from_ref(&id))?;
        Ok(id)
    }

    /// Add a batch of polls and start them. Returns the ids newly scheduled.
    pub fn add_polls(&mut self, schemas: Vec<TaskSchema>) -> Result<Vec<TaskId>> {
        let added: Vec<TaskId> = schemas.into_iter().map(|schema| self.register(schema)).collect();
        self.admit(&added)
    }

    fn register(&mut self, schema: TaskSchema) -> TaskId {
        let flooding = schema.has_no_interval();
        let poll = Task::new(schema);
        let id = poll.id().clone();
        if flooding {
            self.flooding.insert(id.clone());
        }
        self.polls.insert(poll);
        id
    }

    /// Remove a poll from the poller and the scheduler.
    ///
    /// With `reallocate`, the freed budget is redistributed across the
    /// remaining flooding polls. Returns whether the poll was known.
    pub fn remove_poll(&mut self, poll: impl Into<TaskRef>, reallocate: bool) -> bool {
        let poll = poll.into();
        let Some(task) = self.polls.remove(poll.id()) else {
            return false;
        };
        self.flooding.remove(task.id());
        self.scheduler.remove_task(&task);

        if reallocate {
            self.set_interval_in_flooding_polls(self.interval_for_flooding_poll());
        }
        tracing::debug!(poll_id = %task.id(), reallocate, "Poll removed");
        true
    }

    /// Assign `interval` to every flooding poll
    pub fn set_interval_in_flooding_polls(&self, interval: i64) {
        for id in &self.flooding {
            if let Some(poll) = self.polls.get(id) {
                poll.set_interval(interval);
            }
        }
    }

    /// Schedule every unscheduled poll, or none of them.
    ///
    /// On overcommit nothing is scheduled and `QuotaExceeded` is returned.
    pub fn start(&mut self) -> Result<Vec<TaskId>> {
        self.admit(&[])
    }

    /// Schedule every unscheduled poll. On overcommit only the polls in
    /// `added` are dropped; stopped polls admitted earlier stay registered.
    fn admit(&mut self, added: &[TaskId]) -> Result<Vec<TaskId>> {
        let pending = self.unscheduled_polls();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let interval = self.interval_for_flooding_poll();
        if interval < 0 {
            for id in added {
                self.remove_poll(id, false);
            }
            let overage = quota::overage_for(interval);
            tracing::warn!(
                rate_per_min = self.config.rate_per_min,
                overage,
                rejected = added.len(),
                "Poller quota exceeded, polls rolled back"
            );
            return Err(TickpollError::QuotaExceeded {
                rate_per_min: self.config.rate_per_min,
                overage,
            });
        }

        self.set_interval_in_flooding_polls(interval);
        let ids: Vec<TaskId> = pending.into_iter().map(|poll| self.scheduler.add_task(poll)).collect();
        tracing::info!(
            scheduled = ids.len(),
            flooding = self.flooding.len(),
            flooding_interval_ms = interval,
            "Polls scheduled"
        );
        Ok(ids)
    }

    /// Unschedule every poll and reset its due time
    pub fn stop(&mut self) {
        for poll in self.polls.iter() {
            self.scheduler.remove_task(poll);
            // at 0 lets the scheduler assign fresh jitter on the next start
            poll.set_at(0);
        }
    }

    pub fn restart(&mut self) -> Result<Vec<TaskId>> {
        self.stop();
        self.start()
    }

    /// Stop and forget every poll
    pub fn reset(&mut self) {
        self.stop();
        self.polls.clear();
        self.flooding.clear();
    }

    /// Same as `reset`
    pub fn destroy(&mut self) {
        self.reset();
    }
}
