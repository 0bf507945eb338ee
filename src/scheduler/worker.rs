//! # Worker session: tagged scheduling with bulk cancellation.
//!
//! Every task a [`MessageQueueWorker`] posts carries the worker's [`Tag`].
//! Disposing the worker flips its flag and removes all pending messages with
//! that tag in one queue operation.
//!
//! ## Dispose/schedule race
//! ```text
//! schedule():  disposed? ─► no ─► enqueue(task, tag) ─► disposed? ─► yes ─► task.dispose()
//!                                                            │             (removed by id)
//!                                                            └─► no ──► live handle
//! dispose():   disposed.swap(true) ─► remove_tagged(tag)
//! ```
//! Whichever side loses the race, the task is removed: `dispose` finds it by tag
//! if the enqueue happened first, the post-enqueue recheck removes it otherwise.
//! A task the looper already started keeps running; that window is accepted.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::core::{Looper, deadline};
use crate::error::{ScheduleError, TaskError};
use crate::events::EventKind;
use crate::scheduler::{Worker, message_queue::post};
use crate::tasks::{Disposable, Tag, TaskHandle, Work};

/// Cancellable scheduling session on one looper.
pub struct MessageQueueWorker {
    looper: Looper,
    tag: Tag,
    asynchronous: bool,
    disposed: AtomicBool,
}

impl MessageQueueWorker {
    pub(crate) fn new(looper: Looper, asynchronous: bool) -> Self {
        let tag = Tag::next();
        let queue = looper.queue();
        queue
            .bus()
            .publish(queue.event(EventKind::WorkerCreated).with_tag(Some(tag.as_u64())));
        Self {
            looper,
            tag,
            asynchronous,
            disposed: AtomicBool::new(false),
        }
    }

    /// Tag carried by every task this worker posts.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    fn schedule_work(
        &self,
        work: Work,
        delay: Option<Duration>,
    ) -> Result<TaskHandle, ScheduleError> {
        let when = deadline(delay)?;
        if self.is_disposed() {
            return Ok(TaskHandle::disposed());
        }

        let task = post(
            &self.looper,
            Some(self.tag),
            work,
            when,
            delay,
            self.asynchronous,
        )?;
        if self.is_disposed() {
            task.dispose();
            return Ok(TaskHandle::disposed());
        }
        Ok(TaskHandle::live(task))
    }
}

impl Worker for MessageQueueWorker {
    fn schedule<F>(&self, work: F) -> Result<TaskHandle, ScheduleError>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        self.schedule_work(Box::new(work), None)
    }

    fn schedule_delayed<F>(&self, work: F, delay: Duration) -> Result<TaskHandle, ScheduleError>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        self.schedule_work(Box::new(work), Some(delay))
    }
}

impl Disposable for MessageQueueWorker {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let queue = self.looper.queue();
        let removed = queue.remove_tagged(self.tag);
        queue.bus().publish(
            queue
                .event(EventKind::WorkerDisposed)
                .with_tag(Some(self.tag.as_u64()))
                .with_count(removed as u64),
        );
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for MessageQueueWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueueWorker")
            .field("looper", &self.looper.name())
            .field("tag", &self.tag)
            .field("asynchronous", &self.asynchronous)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
