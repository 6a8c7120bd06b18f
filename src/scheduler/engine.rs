//! Scheduler: task registry plus a fixed-cadence dispatch tick.
//!
//! Every tick scans the registry in insertion order and launches each due
//! task on its own tokio task without awaiting it, so a slow task never
//! delays detection of other due tasks. The due check and the Idle->Running
//! transition happen under the task's lock in one step, so a task is never
//! dispatched twice concurrently.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::{NewTask, RetryLimit, SchedulerEvent, Task, TaskFn, TaskId, TaskRef, TaskSchema, TaskState, TimeUnit};
use crate::error::{Result, TickpollError};
use crate::id::{now_ms, random_in_range};
use crate::scheduler::config::SchedulerConfig;
use crate::scheduler::registry::TaskRegistry;

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Receives every scheduler lifecycle event, synchronously, in emission order
pub trait SchedulerObserver: Send + Sync {
    fn on_event(&self, event: &SchedulerEvent);
}

struct SchedulerShared {
    config: SchedulerConfig,
    registry: Mutex<TaskRegistry>,
    observers: Mutex<Vec<Arc<dyn SchedulerObserver>>>,
    event_tx: Mutex<Option<broadcast::Sender<SchedulerEvent>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to a scheduler; clones refer to the same registry
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    /// Create a scheduler. The tick loop does not run until `start()`.
    pub fn new(config: SchedulerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            shared: Arc::new(SchedulerShared {
                config,
                registry: Mutex::new(TaskRegistry::new()),
                observers: Mutex::new(Vec::new()),
                event_tx: Mutex::new(Some(event_tx)),
                ticker: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Spawn the tick loop on the current tokio runtime. No-op if already running.
    ///
    /// Outside a runtime the loop is not started and an `Error` event is emitted.
    pub fn start(&self) {
        let Some(runtime) = self.dispatch_runtime("start") else {
            return;
        };
        let mut ticker = lock(&self.shared.ticker);
        if ticker.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(&self.shared);
        // tokio rejects a zero period
        let period = self.shared.config.tick_interval.max(MIN_TICK_INTERVAL);
        *ticker = Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                Scheduler { shared }.tick();
            }
        }));
        tracing::debug!(tick_ms = period.as_millis() as u64, "Scheduler tick loop started");
    }

    /// Whether the tick loop is running
    pub fn is_running(&self) -> bool {
        lock(&self.shared.ticker).as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Register an observer for all future events
    pub fn add_observer(&self, observer: Arc<dyn SchedulerObserver>) {
        lock(&self.shared.observers).push(observer);
    }

    /// Receive future events over a broadcast channel
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        match lock(&self.shared.event_tx).as_ref() {
            Some(tx) => tx.subscribe(),
            // destroyed: hand back a receiver that is already closed
            None => broadcast::channel(1).1,
        }
    }

    fn emit(&self, event: SchedulerEvent) {
        let observers = lock(&self.shared.observers).clone();
        for observer in &observers {
            observer.on_event(&event);
        }
        if let Some(tx) = lock(&self.shared.event_tx).as_ref() {
            // Ignore send errors (no subscribers is fine)
            let _ = tx.send(event);
        }
    }

    /// Register a task, a schema, or a bare callable. Returns the task id.
    ///
    /// With `random_start`, a task whose `at` is 0 is given a start time
    /// somewhere in the jitter window so registrations do not fire together.
    pub fn add_task(&self, task: impl Into<NewTask>) -> TaskId {
        let task = task.into().into_task();
        let config = &self.shared.config;
        if config.random_start && task.at() == 0 {
            task.set_at(now_ms() + random_in_range(config.jitter_min_ms, config.jitter_max_ms));
        }

        let id = task.id().clone();
        lock(&self.shared.registry).insert(task);
        tracing::debug!(task_id = %id, "Task added");
        self.emit(SchedulerEvent::TaskAdded { id: id.clone() });
        id
    }

    pub fn get_task(&self, id: &str) -> Option<Task> {
        lock(&self.shared.registry).get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.shared.registry).contains(id)
    }

    /// Unregister a task. In-flight runs are not interrupted.
    ///
    /// Returns whether the task was registered.
    pub fn remove_task(&self, task: impl Into<TaskRef>) -> bool {
        let task_ref = task.into();
        let removed = lock(&self.shared.registry).remove(task_ref.id());
        match removed {
            Some(task) => {
                tracing::debug!(task_id = %task.id(), "Task removed");
                self.emit(SchedulerEvent::TaskRemoved {
                    id: task.id().clone(),
                    was_idle: task.is_idle(),
                });
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.registry).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.shared.registry).is_empty()
    }

    /// Registered task ids in dispatch order
    pub fn task_ids(&self) -> Vec<TaskId> {
        lock(&self.shared.registry).ids()
    }

    /// Run `work` once, `amount` units from now, retrying failures without limit.
    ///
    /// Resolves with the final outcome.
    pub fn run_in(
        &self,
        work: TaskFn,
        amount: i64,
        unit: TimeUnit,
    ) -> impl Future<Output = Result<Value>> + Send + 'static {
        self.run_in_with_retries(work, amount, unit, RetryLimit::Unbounded)
    }

    /// `run_in` with an explicit retry budget
    pub fn run_in_with_retries(
        &self,
        work: TaskFn,
        amount: i64,
        unit: TimeUnit,
        limit: RetryLimit,
    ) -> impl Future<Output = Result<Value>> + Send + 'static {
        let (tx, rx) = oneshot::channel::<Result<Value>>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let on_ok = tx.clone();
        let on_err = tx;

        let at = now_ms().saturating_add_signed(unit.of(amount)).max(1);
        let schema = TaskSchema::new(work)
            .at(at)
            .repeat_times_before_fail(limit)
            .on_success(move |result, _| {
                if let Some(tx) = lock(&on_ok).take() {
                    let _ = tx.send(Ok(result.clone()));
                }
            })
            .on_failure(move |error, task| {
                if task.state() == TaskState::Failed {
                    if let Some(tx) = lock(&on_err).take() {
                        let _ = tx.send(Err(error.clone()));
                    }
                }
            });

        let id = self.add_task(schema);
        async move { rx.await.unwrap_or(Err(TickpollError::Cancelled(id))) }
    }

    /// Run `work` once, `amount` units from now, with no retries
    pub fn run_once_in(
        &self,
        work: TaskFn,
        amount: i64,
        unit: TimeUnit,
    ) -> impl Future<Output = Result<Value>> + Send + 'static {
        self.run_in_with_retries(work, amount, unit, RetryLimit::Times(0))
    }

    /// Register a repeating task. Returns its id.
    pub fn run_every(&self, work: TaskFn, interval: i64, unit: TimeUnit, limit: impl Into<RetryLimit>) -> TaskId {
        self.add_task(
            TaskSchema::new(work)
                .every(interval, unit)
                .repeat_times_before_fail(limit),
        )
    }

    /// Scan the registry once and launch every due task. Returns how many were launched.
    ///
    /// Launches need a tokio runtime. Without one nothing is claimed and an
    /// `Error` event is emitted instead.
    pub fn tick(&self) -> usize {
        let Some(runtime) = self.dispatch_runtime("tick") else {
            return 0;
        };
        let now = now_ms();
        let due: Vec<Task> = {
            let registry = lock(&self.shared.registry);
            registry.iter().filter(|task| task.claim_if_due(now)).cloned().collect()
        };

        let launched = due.len();
        for task in due {
            self.emit(SchedulerEvent::TaskLaunched { id: task.id().clone() });
            let scheduler = self.clone();
            runtime.spawn(async move {
                let outcome = task.execute().await;
                scheduler.finish(&task, outcome);
            });
        }
        launched
    }

    /// Launch a specific task now, whether or not it is due.
    ///
    /// An id missing from the registry, or a call made outside a tokio
    /// runtime, emits an `Error` event and returns false.
    pub fn run_task(&self, task: impl Into<TaskRef>) -> bool {
        let task = task.into();
        let Some(runtime) = self.dispatch_runtime(task.id()) else {
            return false;
        };
        let task = match task {
            TaskRef::Handle(task) => task,
            TaskRef::Id(id) => match self.get_task(&id) {
                Some(task) => task,
                None => {
                    tracing::warn!(task_id = %id, "Dispatch of unknown task");
                    self.emit(SchedulerEvent::Error {
                        error: TickpollError::UnknownTask(id.clone()),
                        context: id,
                    });
                    return false;
                }
            },
        };

        self.emit(SchedulerEvent::TaskLaunched { id: task.id().clone() });
        let scheduler = self.clone();
        runtime.spawn(async move {
            let outcome = task.run().await;
            scheduler.finish(&task, outcome);
        });
        true
    }

    fn dispatch_runtime(&self, context: &str) -> Option<Handle> {
        match Handle::try_current() {
            Ok(runtime) => Some(runtime),
            Err(_) => {
                tracing::warn!(context, "Dispatch attempted outside a tokio runtime");
                self.emit(SchedulerEvent::Error {
                    error: TickpollError::InvalidState("dispatch requires a tokio runtime".to_string()),
                    context: context.to_string(),
                });
                None
            }
        }
    }

    fn finish(&self, task: &Task, outcome: Result<Value>) {
        match outcome {
            Ok(result) => {
                tracing::debug!(task_id = %task.id(), "Task run succeeded");
                self.emit(SchedulerEvent::TaskSuccess {
                    result,
                    id: task.id().clone(),
                });
            }
            Err(error) => {
                tracing::warn!(task_id = %task.id(), error = %error, "Task run failed");
                self.emit(SchedulerEvent::TaskFailed {
                    error,
                    id: task.id().clone(),
                });
            }
        }

        if task.is_complete() {
            tracing::info!(task_id = %task.id(), state = %task.state(), "Task completed");
            self.emit(SchedulerEvent::TaskCompleted { id: task.id().clone() });
            self.remove_task(task);
        }
    }

    /// Drop every registered task without emitting events
    pub fn clear(&self) {
        lock(&self.shared.registry).clear();
    }

    /// Clear the registry, stop the tick loop, and release all subscribers
    pub fn destroy(&self) {
        self.clear();
        if let Some(handle) = lock(&self.shared.ticker).take() {
            handle.abort();
        }
        lock(&self.shared.observers).clear();
        lock(&self.shared.event_tx).take();
        tracing::debug!("Scheduler destroyed");
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.shared.config)
            .field("tasks", &self.len())
            .finish_non_exhaustive()
    }
}
