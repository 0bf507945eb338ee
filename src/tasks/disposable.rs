//! # Cancellation capability shared by tasks, handles and workers.

/// Something that can be cancelled.
///
/// `dispose` is idempotent and never blocks; `is_disposed` is a pure read.
///
/// # Example
/// ```
/// use loopsched::{Disposable, TaskHandle};
///
/// let handle = TaskHandle::disposed();
/// handle.dispose();
/// assert!(handle.is_disposed());
/// ```
pub trait Disposable: Send + Sync {
    /// Cancels the resource. Calling it again has no effect.
    fn dispose(&self);

    /// Returns `true` once [`dispose`](Disposable::dispose) has been called
    /// (or the resource was cancelled on its behalf).
    fn is_disposed(&self) -> bool;
}
