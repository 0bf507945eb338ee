//! # Scheduler facade and worker sessions.
//!
//! [`Scheduler`] and [`Worker`] are the reactive-side abstractions; the
//! message-queue implementations post every unit of work onto a [`Looper`](crate::Looper).
//!
//! ```text
//!   caller thread(s)                                  looper thread
//!   ───────────────                                   ─────────────
//!   MessageQueueScheduler::schedule(f) ──┐
//!                                        ├─► DisposableTask ─► queue ─► run() ─► f()
//!   MessageQueueWorker::schedule(f) ─────┘     (tag = worker tag)          │
//!   MessageQueueWorker::dispose() ─► queue.remove_tagged(tag)              └─► error_sink
//! ```
//!
//! - [`MessageQueueScheduler`]: untagged one-off tasks plus [`create_worker`](Scheduler::create_worker);
//! - [`MessageQueueWorker`]: tagged tasks, bulk cancellation on dispose;
//! - [`main_thread`] / [`from_looper`] / [`install_main_looper`]: process-wide entry points.

mod global;
mod message_queue;
mod worker;

use std::time::Duration;

use crate::error::{ScheduleError, TaskError};
use crate::tasks::{Disposable, TaskHandle};

pub use global::{from_looper, install_main_looper, main_thread};
pub use message_queue::MessageQueueScheduler;
pub use worker::MessageQueueWorker;

/// Posts work for execution on a single designated thread.
pub trait Scheduler: Send + Sync {
    /// Worker session type created by [`create_worker`](Scheduler::create_worker).
    type Worker: Worker;

    /// Schedules `work` to run as soon as possible.
    fn schedule<F>(&self, work: F) -> Result<TaskHandle, ScheduleError>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static;

    /// Schedules `work` to run no earlier than `delay` from now.
    fn schedule_delayed<F>(&self, work: F, delay: Duration) -> Result<TaskHandle, ScheduleError>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static;

    /// Creates an independent worker session.
    fn create_worker(&self) -> Self::Worker;
}

/// A cancellable scheduling session; disposing it cancels all of its pending work.
pub trait Worker: Disposable {
    /// Schedules `work` to run as soon as possible.
    ///
    /// Returns an already-disposed handle when the worker is disposed.
    fn schedule<F>(&self, work: F) -> Result<TaskHandle, ScheduleError>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static;

    /// Schedules `work` to run no earlier than `delay` from now.
    fn schedule_delayed<F>(&self, work: F, delay: Duration) -> Result<TaskHandle, ScheduleError>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static;
}
