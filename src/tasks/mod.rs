//! # Task abstractions.
//!
//! This module provides the task-related types:
//! - [`Disposable`] - cancellation capability (`dispose` / `is_disposed`)
//! - [`DisposableTask`] - run-once, cancellable wrapper enqueued on a looper
//! - [`TaskHandle`] - what `schedule` returns to the caller
//! - [`Tag`] - per-worker identity for bulk removal
//! - [`Work`] - boxed closure type accepted by schedulers

mod disposable;
mod handle;
mod tag;
mod task;

pub use disposable::Disposable;
pub use handle::TaskHandle;
pub use tag::Tag;
pub(crate) use task::RunOutcome;
pub use task::{DisposableTask, TaskId, Work};
