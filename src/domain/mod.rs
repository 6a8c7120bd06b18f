//! Domain types for tickpoll
//!
//! This module contains the core domain types:
//! - Task: a schedulable unit of work with its state machine and retry policy
//! - TimeUnit: millisecond multipliers for intervals and delays
//! - SchedulerEvent: lifecycle signals emitted by the scheduler

pub mod event;
pub mod task;
pub mod time_unit;

pub use event::{SchedulerEvent, event_types};
pub use task::{
    BoxTaskFuture, FAST_RETRY_CAP_MS, FailureCallback, NewTask, RetryLimit, RunAt, SuccessCallback, Task, TaskFn,
    TaskId, TaskOutput, TaskRef, TaskSchema, TaskState,
};
pub use time_unit::TimeUnit;
