//! Insertion-ordered task registry.
//!
//! Used by both the scheduler (dispatch-scan order) and the poller
//! (bookkeeping order).

use std::collections::HashMap;

use crate::domain::{Task, TaskId};

/// Mapping from task id to task that iterates in insertion order
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task; re-inserting an id keeps its original position
    pub fn insert(&mut self, task: Task) {
        let id = task.id().clone();
        if self.tasks.insert(id.clone(), task).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let task = self.tasks.remove(id)?;
        self.order.retain(|other| other != id);
        Some(task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.tasks.clear();
    }

    /// Tasks in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.order.clone()
    }
}
