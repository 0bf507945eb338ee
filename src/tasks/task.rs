//! # Disposable task: the unit that travels through the message queue.
//!
//! A [`DisposableTask`] wraps one [`Work`] closure. The same `Arc` is enqueued on
//! the looper and handed back to the caller (inside a [`TaskHandle`](crate::TaskHandle)),
//! so either side can observe or cancel it.
//!
//! ## Rules
//! - The work runs **at most once**: `run` checks `disposed`, then claims `started`.
//! - `dispose` is idempotent; the first call asks the queue to drop the pending message.
//! - A task dropped by the queue (tag removal, quit) is marked disposed.
//! - Errors and panics from the work never leave `run`; they go to the
//!   [error sink](crate::error_sink).
//!
//! ```text
//!            dispose()                 run() on looper thread
//!               │                              │
//!   disposed.swap(true) ──► queue.remove ─┐    ├─ disposed? ──► Skipped
//!                                         │    ├─ started.swap(true)? ──► Skipped
//!                                         ▼    └─ work() ──► Completed | Failed ──► error sink
//!                               message gone; run never begins
//! ```

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::MessageQueue;
use crate::error::TaskError;
use crate::error_sink;
use crate::tasks::{Disposable, Tag};

/// Zero-argument unit of work accepted by schedulers.
pub type Work = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a task; the queue removes pending messages by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value (for logs and events).
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// What happened when the looper dequeued a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    /// Disposed before it started, or already started once.
    Skipped,
    /// Work returned `Ok(())`.
    Completed,
    /// Work failed; the error was already handed to the error sink.
    Failed(TaskError),
}

/// A cancellable, run-once wrapper around [`Work`].
pub struct DisposableTask {
    id: TaskId,
    tag: Option<Tag>,
    work: Mutex<Option<Work>>,
    disposed: AtomicBool,
    started: AtomicBool,
    queue: Weak<MessageQueue>,
}

impl DisposableTask {
    pub(crate) fn new(queue: &Arc<MessageQueue>, tag: Option<Tag>, work: Work) -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            tag,
            work: Mutex::new(Some(work)),
            disposed: AtomicBool::new(false),
            started: AtomicBool::new(false),
            queue: Arc::downgrade(queue),
        })
    }

    /// Task identity.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Tag of the worker that scheduled this task (`None` for scheduler-level tasks).
    #[inline]
    pub fn tag(&self) -> Option<Tag> {
        self.tag
    }

    /// True once the looper has begun running the work.
    #[inline]
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Runs the work on the calling (looper) thread.
    pub(crate) fn run(&self) -> RunOutcome {
        if self.disposed.load(Ordering::Acquire) {
            return RunOutcome::Skipped;
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return RunOutcome::Skipped;
        }
        let Some(work) = self.work.lock().take() else {
            return RunOutcome::Skipped;
        };

        let result = match catch_unwind(AssertUnwindSafe(work)) {
            Ok(res) => res,
            Err(payload) => Err(TaskError::from_panic(payload)),
        };
        match result {
            Ok(()) => RunOutcome::Completed,
            Err(err) => {
                error_sink::handle(&err);
                RunOutcome::Failed(err)
            }
        }
    }

    /// Marks the task disposed without touching the queue.
    ///
    /// Used by the queue itself after it dropped the message.
    pub(crate) fn mark_disposed(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.release_work();
        }
    }

    fn release_work(&self) {
        if !self.started.load(Ordering::Acquire) {
            drop(self.work.lock().take());
        }
    }
}

impl Disposable for DisposableTask {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(queue) = self.queue.upgrade() {
            queue.remove_task(self.id);
        }
        self.release_work();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for DisposableTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableTask")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("disposed", &self.is_disposed())
            .field("started", &self.has_started())
            .finish()
    }
}
