//! Lifecycle events emitted by the scheduler.

use serde_json::Value;

use crate::domain::TaskId;
use crate::error::TickpollError;

/// Event name constants
pub mod event_types {
    pub const TASK_ADDED: &str = "task.added";
    pub const TASK_REMOVED: &str = "task.removed";
    pub const TASK_LAUNCHED: &str = "task.launched";
    pub const TASK_SUCCESS: &str = "task.success";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const ERROR: &str = "error";
}

/// A scheduler lifecycle signal
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// Task registered
    TaskAdded { id: TaskId },
    /// Task unregistered; `was_idle` reports its state at removal time
    TaskRemoved { id: TaskId, was_idle: bool },
    /// Attempt about to be invoked
    TaskLaunched { id: TaskId },
    /// Attempt resolved
    TaskSuccess { result: Value, id: TaskId },
    /// Attempt rejected
    TaskFailed { error: TickpollError, id: TaskId },
    /// Task reached a terminal state and is being dropped from the registry
    TaskCompleted { id: TaskId },
    /// Dispatch problem with no caller to report to
    Error { error: TickpollError, context: String },
}

impl SchedulerEvent {
    /// Dotted event name
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerEvent::TaskAdded { .. } => event_types::TASK_ADDED,
            SchedulerEvent::TaskRemoved { .. } => event_types::TASK_REMOVED,
            SchedulerEvent::TaskLaunched { .. } => event_types::TASK_LAUNCHED,
            SchedulerEvent::TaskSuccess { .. } => event_types::TASK_SUCCESS,
            SchedulerEvent::TaskFailed { .. } => event_types::TASK_FAILED,
            SchedulerEvent::TaskCompleted { .. } => event_types::TASK_COMPLETED,
            SchedulerEvent::Error { .. } => event_types::ERROR,
        }
    }

    /// Task the event concerns, if any
    pub fn task_id(&self) -> Option<&str> {
        match self {
            SchedulerEvent::TaskAdded { id }
            | SchedulerEvent::TaskRemoved { id, .. }
            | SchedulerEvent::TaskLaunched { id }
            | SchedulerEvent::TaskSuccess { id, .. }
            | SchedulerEvent::TaskFailed { id, .. }
            | SchedulerEvent::TaskCompleted { id } => Some(id),
            SchedulerEvent::Error { .. } => None,
        }
    }
}
