//! # Handle returned by `schedule` calls.

use std::sync::Arc;

use crate::tasks::{Disposable, DisposableTask, TaskId};

/// Cancellation handle for one scheduled task.
///
/// Either wraps the live [`DisposableTask`] that sits in the queue, or is an
/// already-disposed handle returned when scheduling was rejected by a disposed
/// worker.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    task: Option<Arc<DisposableTask>>,
}

impl TaskHandle {
    pub(crate) fn live(task: Arc<DisposableTask>) -> Self {
        Self { task: Some(task) }
    }

    /// A handle that is disposed from the start and refers to no task.
    pub fn disposed() -> Self {
        Self { task: None }
    }

    /// Identity of the underlying task, if any.
    pub fn id(&self) -> Option<TaskId> {
        self.task.as_ref().map(|t| t.id())
    }

    /// The underlying task, if any.
    pub fn task(&self) -> Option<&Arc<DisposableTask>> {
        self.task.as_ref()
    }
}

impl Disposable for TaskHandle {
    fn dispose(&self) {
        if let Some(task) = &self.task {
            task.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_disposed())
    }
}
