//! Task: a single schedulable unit of deferred work
//!
//! A Task wraps a callable with its arguments, a due timestamp, an optional
//! repeat interval and a bounded retry policy. Its state machine is:
//!
//! ```text
//! Idle --run()--> Running --ok--> Idle       (repeating)
//!                         --ok--> Succeeded  (one-shot)
//!                         --err-> Idle       (repeating, or retries left)
//!                         --err-> Failed     (one-shot, retries exhausted)
//! ```
//!
//! `Task` is a cheap handle; clones share the same state, so the scheduler
//! and poller registries can both hold the same task.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::Handle;

use crate::domain::TimeUnit;
use crate::error::{Result, TickpollError};
use crate::id::{generate_task_id, now_ms};

/// Upper bound on the delay before a failed attempt is retried (ms)
pub const FAST_RETRY_CAP_MS: i64 = 100;

/// Opaque task identifier
pub type TaskId = String;

/// Boxed future produced by an async task callable
pub type BoxTaskFuture = BoxFuture<'static, Result<Value>>;

/// Invoked after every successful attempt
pub type SuccessCallback = Arc<dyn Fn(&Value, &Task) + Send + Sync>;

/// Invoked after every failed attempt
pub type FailureCallback = Arc<dyn Fn(&TickpollError, &Task) + Send + Sync>;

/// State of a task's execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    /// Returns true if no further runs will happen (one-shot tasks only)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Idle => "idle",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How many failed attempts a one-shot task tolerates before it fails for good
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryLimit {
    Times(u32),
    Unbounded,
}

impl RetryLimit {
    /// True once `fails` previous failures have used up the budget
    pub fn is_exhausted(&self, fails: u32) -> bool {
        match self {
            RetryLimit::Times(n) => fails >= *n,
            RetryLimit::Unbounded => false,
        }
    }
}

impl Default for RetryLimit {
    fn default() -> Self {
        RetryLimit::Times(0)
    }
}

impl From<u32> for RetryLimit {
    fn from(n: u32) -> Self {
        RetryLimit::Times(n)
    }
}

/// What a callable hands back when invoked
pub enum TaskOutput {
    /// Finished synchronously
    Ready(Result<Value>),
    /// Finishes when the future resolves
    Deferred(BoxTaskFuture),
}

/// The work a task performs, tagged with its execution mode
#[derive(Clone)]
pub enum TaskFn {
    Sync(Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>),
    Async(Arc<dyn Fn(Vec<Value>) -> BoxTaskFuture + Send + Sync>),
}

impl TaskFn {
    /// Wrap a synchronous closure
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        TaskFn::Sync(Arc::new(f))
    }

    /// Wrap a closure returning a future
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        TaskFn::Async(Arc::new(move |args| f(args).boxed()))
    }

    /// Call the work with the given arguments
    pub fn invoke(&self, args: &[Value]) -> TaskOutput {
        match self {
            TaskFn::Sync(f) => TaskOutput::Ready(f(args)),
            TaskFn::Async(f) => TaskOutput::Deferred(f(args.to_vec())),
        }
    }
}

impl fmt::Debug for TaskFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFn::Sync(_) => f.write_str("TaskFn::Sync"),
            TaskFn::Async(_) => f.write_str("TaskFn::Async"),
        }
    }
}

/// Declarative description of a task
#[derive(Clone)]
pub struct TaskSchema {
    pub work: TaskFn,
    pub args: Vec<Value>,
    /// Due timestamp (ms since epoch); 0 lets the scheduler pick one
    pub at: u64,
    /// Repeat interval in ms; `None` when the caller did not supply one
    pub interval: Option<i64>,
    pub repeat_times_before_fail: RetryLimit,
    pub on_success: Option<SuccessCallback>,
    pub on_failure: Option<FailureCallback>,
}

impl TaskSchema {
    pub fn new(work: TaskFn) -> Self {
        Self {
            work,
            args: Vec::new(),
            at: 0,
            interval: None,
            repeat_times_before_fail: RetryLimit::default(),
            on_success: None,
            on_failure: None,
        }
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn at(mut self, at: u64) -> Self {
        self.at = at;
        self
    }

    pub fn interval(mut self, interval_ms: i64) -> Self {
        self.interval = Some(interval_ms);
        self
    }

    pub fn every(self, amount: i64, unit: TimeUnit) -> Self {
        self.interval(unit.of(amount))
    }

    pub fn repeat_times_before_fail(mut self, limit: impl Into<RetryLimit>) -> Self {
        self.repeat_times_before_fail = limit.into();
        self
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Task) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&TickpollError, &Task) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(f));
        self
    }

    /// True when no usable interval was supplied (the poller floods these)
    pub fn has_no_interval(&self) -> bool {
        self.interval.is_none_or(|i| i == 0)
    }
}

impl fmt::Debug for TaskSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSchema")
            .field("work", &self.work)
            .field("args", &self.args)
            .field("at", &self.at)
            .field("interval", &self.interval)
            .field("repeat_times_before_fail", &self.repeat_times_before_fail)
            .finish_non_exhaustive()
    }
}

/// Absolute due time, as a timestamp or a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAt {
    Timestamp(u64),
    Date(DateTime<Utc>),
}

impl RunAt {
    pub fn as_millis(&self) -> u64 {
        match self {
            RunAt::Timestamp(ms) => *ms,
            RunAt::Date(date) => date.timestamp_millis().max(0) as u64,
        }
    }
}

impl From<u64> for RunAt {
    fn from(ms: u64) -> Self {
        RunAt::Timestamp(ms)
    }
}

impl From<DateTime<Utc>> for RunAt {
    fn from(date: DateTime<Utc>) -> Self {
        RunAt::Date(date)
    }
}

#[derive(Debug)]
struct TaskRuntime {
    at: u64,
    interval: i64,
    state: TaskState,
    fails: u32,
}

struct TaskInner {
    id: TaskId,
    work: TaskFn,
    args: Vec<Value>,
    repeat_times_before_fail: RetryLimit,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
    runtime: Mutex<TaskRuntime>,
}

/// Shared handle to a schedulable unit of work
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    pub fn new(schema: TaskSchema) -> Self {
        let runtime = TaskRuntime {
            at: schema.at,
            interval: schema.interval.unwrap_or(0),
            state: TaskState::Idle,
            fails: 0,
        };
        Self {
            inner: Arc::new(TaskInner {
                id: generate_task_id(),
                work: schema.work,
                args: schema.args,
                repeat_times_before_fail: schema.repeat_times_before_fail,
                on_success: schema.on_success,
                on_failure: schema.on_failure,
                runtime: Mutex::new(runtime),
            }),
        }
    }

    /// One-shot task around a synchronous closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(TaskSchema::new(TaskFn::sync(f)))
    }

    /// One-shot task around an async closure
    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::new(TaskSchema::new(TaskFn::from_async(f)))
    }

    fn runtime(&self) -> MutexGuard<'_, TaskRuntime> {
        self.inner.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &TaskId {
        &self.inner.id
    }

    pub fn at(&self) -> u64 {
        self.runtime().at
    }

    pub fn set_at(&self, at: u64) {
        self.runtime().at = at;
    }

    pub fn interval(&self) -> i64 {
        self.runtime().interval
    }

    pub fn set_interval(&self, interval_ms: i64) {
        self.runtime().interval = interval_ms;
    }

    pub fn state(&self) -> TaskState {
        self.runtime().state
    }

    /// Consecutive failed attempts since the last success
    pub fn failures(&self) -> u32 {
        self.runtime().fails
    }

    pub fn repeat_times_before_fail(&self) -> RetryLimit {
        self.inner.repeat_times_before_fail
    }

    pub fn is_idle(&self) -> bool {
        self.state() == TaskState::Idle
    }

    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_one_time(&self) -> bool {
        self.interval() <= 0
    }

    pub fn is_due(&self) -> bool {
        self.is_due_at(now_ms())
    }

    pub fn is_due_at(&self, now: u64) -> bool {
        let rt = self.runtime();
        rt.state == TaskState::Idle && now >= rt.at
    }

    /// Set the repeat interval to `amount` units
    pub fn repeat_every(&self, amount: i64, unit: TimeUnit) -> &Self {
        self.set_interval(unit.of(amount));
        self
    }

    /// Set the absolute due time
    pub fn run_at(&self, when: impl Into<RunAt>) -> &Self {
        self.set_at(when.into().as_millis());
        self
    }

    /// Run one attempt of the task.
    ///
    /// Fails immediately with `InvalidState` unless the task is idle, or if
    /// the task has callbacks and no tokio runtime is current. Every failed
    /// attempt is returned as an error, including ones that will be retried.
    /// Callbacks are spawned on the runtime, never run inline.
    pub async fn run(&self) -> Result<Value> {
        let callbacks = self.callback_runtime()?;
        self.claim()?;
        self.execute_on(callbacks).await
    }

    fn callback_runtime(&self) -> Result<Option<Handle>> {
        if self.inner.on_success.is_none() && self.inner.on_failure.is_none() {
            return Ok(None);
        }
        Handle::try_current().map(Some).map_err(|_| {
            TickpollError::InvalidState(format!(
                "task {} has callbacks but no tokio runtime is running",
                self.inner.id
            ))
        })
    }

    /// Idle -> Running, or `InvalidState`
    pub(crate) fn claim(&self) -> Result<()> {
        let mut rt = self.runtime();
        if rt.state != TaskState::Idle {
            return Err(TickpollError::InvalidState(format!(
                "task {} is already {}",
                self.inner.id, rt.state
            )));
        }
        rt.state = TaskState::Running;
        Ok(())
    }

    /// Due check and Idle -> Running as one step
    pub(crate) fn claim_if_due(&self, now: u64) -> bool {
        let mut rt = self.runtime();
        if rt.state == TaskState::Idle && now >= rt.at {
            rt.state = TaskState::Running;
            true
        } else {
            false
        }
    }

    /// Invoke the work of a task that has already been claimed.
    /// Only called from scheduler dispatch, which runs on a tokio task.
    pub(crate) async fn execute(&self) -> Result<Value> {
        self.execute_on(Handle::try_current().ok()).await
    }

    async fn execute_on(&self, callbacks: Option<Handle>) -> Result<Value> {
        let outcome = match self.inner.work.invoke(&self.inner.args) {
            TaskOutput::Ready(result) => result,
            TaskOutput::Deferred(fut) => fut.await,
        };
        self.settle(outcome, callbacks.as_ref())
    }

    fn settle(&self, outcome: Result<Value>, callbacks: Option<&Handle>) -> Result<Value> {
        let now = now_ms();
        match outcome {
            Ok(value) => {
                {
                    let mut rt = self.runtime();
                    if rt.interval <= 0 {
                        rt.state = TaskState::Succeeded;
                    } else {
                        rt.fails = 0;
                        rt.at = now.saturating_add_signed(rt.interval);
                        rt.state = TaskState::Idle;
                    }
                }
                if let (Some(cb), Some(runtime)) = (self.inner.on_success.clone(), callbacks) {
                    let task = self.clone();
                    let result = value.clone();
                    runtime.spawn(async move { cb(&result, &task) });
                }
                Ok(value)
            }
            Err(err) => {
                {
                    let mut rt = self.runtime();
                    if rt.interval <= 0 && self.inner.repeat_times_before_fail.is_exhausted(rt.fails) {
                        rt.state = TaskState::Failed;
                    } else {
                        rt.fails += 1;
                        let backoff = rt.interval.min(FAST_RETRY_CAP_MS).max(0);
                        rt.at = now.saturating_add_signed(backoff);
                        rt.state = TaskState::Idle;
                        tracing::debug!(
                            task_id = %self.inner.id,
                            fails = rt.fails,
                            retry_in_ms = backoff,
                            "Task attempt failed, retrying"
                        );
                    }
                }
                if let (Some(cb), Some(runtime)) = (self.inner.on_failure.clone(), callbacks) {
                    let task = self.clone();
                    let error = err.clone();
                    runtime.spawn(async move { cb(&error, &task) });
                }
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rt = self.runtime();
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("work", &self.inner.work)
            .field("at", &rt.at)
            .field("interval", &rt.interval)
            .field("state", &rt.state)
            .field("fails", &rt.fails)
            .finish()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.id)
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Task {}

/// Anything `Scheduler::add_task` can turn into a task
pub enum NewTask {
    Task(Task),
    Schema(TaskSchema),
    Fn(TaskFn),
}

impl NewTask {
    pub fn into_task(self) -> Task {
        match self {
            NewTask::Task(task) => task,
            NewTask::Schema(schema) => Task::new(schema),
            NewTask::Fn(work) => Task::new(TaskSchema::new(work)),
        }
    }
}

impl From<Task> for NewTask {
    fn from(task: Task) -> Self {
        NewTask::Task(task)
    }
}

impl From<&Task> for NewTask {
    fn from(task: &Task) -> Self {
        NewTask::Task(task.clone())
    }
}

impl From<TaskSchema> for NewTask {
    fn from(schema: TaskSchema) -> Self {
        NewTask::Schema(schema)
    }
}

impl From<TaskFn> for NewTask {
    fn from(work: TaskFn) -> Self {
        NewTask::Fn(work)
    }
}

/// A task referenced by id or by handle
#[derive(Debug, Clone)]
pub enum TaskRef {
    Id(TaskId),
    Handle(Task),
}

impl TaskRef {
    pub fn id(&self) -> &str {
        match self {
            TaskRef::Id(id) => id,
            TaskRef::Handle(task) => task.id(),
        }
    }
}

impl From<&str> for TaskRef {
    fn from(id: &str) -> Self {
        TaskRef::Id(id.to_string())
    }
}

impl From<String> for TaskRef {
    fn from(id: String) -> Self {
        TaskRef::Id(id)
    }
}

impl From<&String> for TaskRef {
    fn from(id: &String) -> Self {
        TaskRef::Id(id.clone())
    }
}

impl From<Task> for TaskRef {
    fn from(task: Task) -> Self {
        TaskRef::Handle(task)
    }
}

impl From<&Task> for TaskRef {
    fn from(task: &Task) -> Self {
        TaskRef::Handle(task.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::sync::oneshot;

    fn ok_task(interval: Option<i64>) -> Task {
        let mut schema = TaskSchema::new(TaskFn::sync(|_| Ok(Value::from("done"))));
        schema.interval = interval;
        Task::new(schema)
    }

    /// Fails `failures` times, then succeeds with "success"
    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> TaskFn {
        TaskFn::sync(move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                Err(TickpollError::failure("error"))
            } else {
                Ok(Value::from("success"))
            }
        })
    }

    #[test]
    fn test_task_defaults() {
        let task = ok_task(None);
        assert_eq!(task.state(), TaskState::Idle);
        assert_eq!(task.at(), 0);
        assert_eq!(task.interval(), 0);
        assert!(task.is_one_time());
        assert!(task.is_due());
        assert!(!task.is_complete());
        assert_eq!(task.repeat_times_before_fail(), RetryLimit::Times(0));
    }

    #[test]
    fn test_task_state_display() {
        assert_eq!(TaskState::Idle.to_string(), "idle");
        assert_eq!(TaskState::Running.to_string(), "running");
        assert_eq!(TaskState::Succeeded.to_string(), "succeeded");
        assert_eq!(TaskState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_retry_limit_exhaustion() {
        assert!(RetryLimit::Times(0).is_exhausted(0));
        assert!(!RetryLimit::Times(2).is_exhausted(1));
        assert!(RetryLimit::Times(2).is_exhausted(2));
        assert!(!RetryLimit::Unbounded.is_exhausted(u32::MAX));
        assert_eq!(RetryLimit::default(), RetryLimit::Times(0));
        assert_eq!(RetryLimit::from(3), RetryLimit::Times(3));
    }

    #[test]
    fn test_is_due_respects_at() {
        let task = ok_task(None);
        task.set_at(now_ms() + 60_000);
        assert!(!task.is_due());
        assert!(task.is_due_at(task.at()));
    }

    #[test]
    fn test_repeat_every_and_run_at_chain() {
        let task = ok_task(None);
        task.repeat_every(5, TimeUnit::Second).run_at(1234u64);
        assert_eq!(task.interval(), 5000);
        assert_eq!(task.at(), 1234);
        assert!(!task.is_one_time());
    }

    #[test]
    fn test_run_at_date() {
        let task = ok_task(None);
        let date = DateTime::<Utc>::from_timestamp_millis(1_738_300_800_123).unwrap();
        task.run_at(date);
        assert_eq!(task.at(), 1_738_300_800_123);
    }

    #[test]
    fn test_schema_has_no_interval() {
        let work = TaskFn::sync(|_| Ok(Value::Null));
        assert!(TaskSchema::new(work.clone()).has_no_interval());
        assert!(TaskSchema::new(work.clone()).interval(0).has_no_interval());
        assert!(!TaskSchema::new(work.clone()).interval(1000).has_no_interval());
        assert!(!TaskSchema::new(work).every(2, TimeUnit::Minute).has_no_interval());
    }

    #[test]
    fn test_claim_if_due_is_exclusive() {
        let task = ok_task(None);
        let now = now_ms();
        assert!(task.claim_if_due(now));
        assert!(!task.claim_if_due(now));
        assert_eq!(task.state(), TaskState::Running);
    }

    #[test]
    fn test_task_handles_share_state() {
        let task = ok_task(None);
        let other = task.clone();
        other.set_interval(42);
        assert_eq!(task.interval(), 42);
        assert_eq!(task, other);
        assert_ne!(task, ok_task(None));
        assert_eq!(task.to_string(), *task.id());
    }

    #[test]
    fn test_task_ref_id() {
        let task = ok_task(None);
        assert_eq!(TaskRef::from(&task).id(), task.id());
        assert_eq!(TaskRef::from("abc").id(), "abc");
    }

    #[tokio::test]
    async fn test_one_shot_success() {
        let task = ok_task(None);
        let result = task.run().await.unwrap();
        assert_eq!(result, Value::from("done"));
        assert_eq!(task.state(), TaskState::Succeeded);
        assert!(task.is_complete());
        assert!(!task.is_due());
    }

    #[tokio::test]
    async fn test_run_when_not_idle_is_rejected() {
        let task = ok_task(None);
        task.run().await.unwrap();

        let err = task.run().await.unwrap_err();
        assert_eq!(
            err,
            TickpollError::InvalidState(format!("task {} is already succeeded", task.id()))
        );
        assert_eq!(task.state(), TaskState::Succeeded);
    }

    #[tokio::test]
    async fn test_repeating_success_reschedules() {
        let task = ok_task(Some(1000));
        let before = now_ms();
        task.run().await.unwrap();
        assert_eq!(task.state(), TaskState::Idle);
        assert!(task.at() >= before + 1000);
        assert_eq!(task.failures(), 0);
    }

    #[tokio::test]
    async fn test_repeating_failure_uses_capped_backoff() {
        let task = Task::new(
            TaskSchema::new(TaskFn::sync(|_| Err(TickpollError::failure("boom")))).interval(60_000),
        );
        let before = now_ms();
        let err = task.run().await.unwrap_err();
        assert_eq!(err, TickpollError::failure("boom"));
        assert_eq!(task.state(), TaskState::Idle);
        assert_eq!(task.failures(), 1);
        assert!(task.at() >= before + 100);
        assert!(task.at() < before + 60_000);
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let task = Task::new(TaskSchema::new(flaky(2, calls)).interval(1000));
        assert!(task.run().await.is_err());
        task.set_at(0);
        assert!(task.run().await.is_err());
        assert_eq!(task.failures(), 2);
        task.set_at(0);
        task.run().await.unwrap();
        assert_eq!(task.failures(), 0);
    }

    #[tokio::test]
    async fn test_one_shot_with_zero_retries_fails_terminally() {
        let calls = Arc::new(AtomicU32::new(0));
        let task = Task::new(TaskSchema::new(flaky(1, calls.clone())));
        assert!(task.run().await.is_err());
        assert_eq!(task.state(), TaskState::Failed);
        assert!(task.is_complete());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_shot_retries_until_budget_spent() {
        let calls = Arc::new(AtomicU32::new(0));
        let task = Task::new(TaskSchema::new(flaky(2, calls.clone())).repeat_times_before_fail(2));

        // each failed attempt is visible to the caller
        assert!(task.run().await.is_err());
        assert_eq!(task.state(), TaskState::Idle);
        assert!(task.run().await.is_err());
        assert_eq!(task.state(), TaskState::Idle);

        let result = task.run().await.unwrap();
        assert_eq!(result, Value::from("success"));
        assert_eq!(task.state(), TaskState::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_one_shot_retry_budget_of_one() {
        let calls = Arc::new(AtomicU32::new(0));
        let task = Task::new(TaskSchema::new(flaky(2, calls.clone())).repeat_times_before_fail(1));
        assert!(task.run().await.is_err());
        assert_eq!(task.state(), TaskState::Idle);
        assert!(task.run().await.is_err());
        assert_eq!(task.state(), TaskState::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_one_shot_retry_is_due_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let task = Task::new(TaskSchema::new(flaky(1, calls)).repeat_times_before_fail(RetryLimit::Unbounded));
        assert!(task.run().await.is_err());
        assert!(task.is_due());
    }

    #[tokio::test]
    async fn test_async_work() {
        let task = Task::new(
            TaskSchema::new(TaskFn::from_async(|args: Vec<Value>| async move {
                tokio::task::yield_now().await;
                Ok(Value::from(args.len()))
            }))
            .args(vec![Value::from(1), Value::from(2)]),
        );
        assert_eq!(task.run().await.unwrap(), Value::from(2));
        assert_eq!(task.state(), TaskState::Succeeded);
    }

    #[tokio::test]
    async fn test_async_work_failure() {
        let task = Task::from_async_fn(|_| async { Err(TickpollError::failure("remote down")) });
        let err = task.run().await.unwrap_err();
        assert_eq!(err, TickpollError::failure("remote down"));
        assert_eq!(task.state(), TaskState::Failed);
    }

    #[tokio::test]
    async fn test_success_callback_is_deferred() {
        let fired = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let flag = fired.clone();
        let task = Task::new(
            TaskSchema::new(TaskFn::sync(|_| Ok(Value::from(7)))).on_success(move |result, task| {
                flag.store(true, Ordering::SeqCst);
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send((result.clone(), task.state()));
                }
            }),
        );

        task.run().await.unwrap();
        assert!(!fired.load(Ordering::SeqCst));

        let (result, state) = rx.await.unwrap();
        assert_eq!(result, Value::from(7));
        assert_eq!(state, TaskState::Succeeded);
    }

    #[test]
    fn test_callbacks_without_runtime_are_rejected() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let task = Task::new(
            TaskSchema::new(TaskFn::sync(|_| Ok(Value::from(7))))
                .on_success(move |_, _| flag.store(true, Ordering::SeqCst)),
        );

        let err = futures::executor::block_on(task.run()).unwrap_err();

        assert!(matches!(err, TickpollError::InvalidState(_)));
        assert_eq!(task.state(), TaskState::Idle);
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_run_without_callbacks_needs_no_runtime() {
        let task = ok_task(None);
        let result = futures::executor::block_on(task.run()).unwrap();
        assert_eq!(result, Value::from("done"));
        assert_eq!(task.state(), TaskState::Succeeded);
    }

    #[tokio::test]
    async fn test_failure_callback_receives_error() {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let task = Task::new(
            TaskSchema::new(TaskFn::sync(|_| Err(TickpollError::failure("nope")))).on_failure(move |err, task| {
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send((err.clone(), task.state()));
                }
            }),
        );

        assert!(task.run().await.is_err());
        let (err, state) = rx.await.unwrap();
        assert_eq!(err, TickpollError::failure("nope"));
        assert_eq!(state, TaskState::Failed);
    }
}
