//! # Runtime events emitted by loopers, schedulers and tasks.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Looper events**: loop start/stop and sync barriers
//! - **Queue events**: messages posted and removed
//! - **Task events**: execution flow (starting, stopped, failed, skipped)
//! - **Worker events**: worker sessions created and disposed
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task id,
//! worker tag, delays and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use loopsched::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::MessagePosted)
//!     .with_looper("main")
//!     .with_task(7)
//!     .with_delay(Duration::from_millis(100));
//!
//! assert_eq!(ev.kind, EventKind::MessagePosted);
//! assert_eq!(ev.looper.as_deref(), Some("main"));
//! assert_eq!(ev.delay_ms, Some(100));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and reason ("full", "closed")
    SubscriberOverflow,

    // === Looper events ===
    /// The loop began dispatching on its thread.
    ///
    /// Sets:
    /// - `looper`: looper name
    LooperStarted,

    /// The loop exited after `quit` / `quit_safely`.
    ///
    /// Sets:
    /// - `looper`: looper name
    LooperStopped,

    /// A sync barrier was inserted.
    ///
    /// Sets:
    /// - `looper`: looper name
    /// - `count`: barrier token
    BarrierPosted,

    /// A sync barrier was removed.
    ///
    /// Sets:
    /// - `looper`: looper name
    /// - `count`: barrier token
    BarrierRemoved,

    // === Queue events ===
    /// A task was enqueued.
    ///
    /// Sets:
    /// - `looper`: looper name
    /// - `task`: task id
    /// - `tag`: worker tag (if posted by a worker)
    /// - `delay_ms`: requested delay (if delayed)
    MessagePosted,

    /// Pending tasks were removed without running.
    ///
    /// Sets:
    /// - `looper`: looper name
    /// - `task`: task id (removal by identity)
    /// - `tag`: worker tag (removal by tag)
    /// - `count`: number of messages removed
    MessagesRemoved,

    // === Task events ===
    /// Task is about to run on the looper thread.
    ///
    /// Sets:
    /// - `looper`, `task`, `tag`
    TaskStarting,

    /// Task finished without error.
    ///
    /// Sets:
    /// - `looper`, `task`, `tag`
    TaskStopped,

    /// Task returned an error or panicked; the error went to the error sink.
    ///
    /// Sets:
    /// - `looper`, `task`, `tag`
    /// - `reason`: error message
    TaskFailed,

    /// Task was dequeued but had been disposed in the meantime; it did not run.
    ///
    /// Sets:
    /// - `looper`, `task`, `tag`
    TaskSkipped,

    // === Worker events ===
    /// A worker session was created.
    ///
    /// Sets:
    /// - `looper`, `tag`
    WorkerCreated,

    /// A worker session was disposed (first call only).
    ///
    /// Sets:
    /// - `looper`, `tag`
    /// - `count`: pending messages purged
    WorkerDisposed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the looper the event belongs to.
    pub looper: Option<Arc<str>>,
    /// Task identifier, if applicable.
    pub task: Option<u64>,
    /// Worker tag, if applicable.
    pub tag: Option<u64>,
    /// Requested delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Counter payload (removed messages, barrier token).
    pub count: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            looper: None,
            task: None,
            tag: None,
            delay_ms: None,
            count: None,
            reason: None,
        }
    }

    /// Attaches a looper name.
    #[inline]
    pub fn with_looper(mut self, looper: impl Into<Arc<str>>) -> Self {
        self.looper = Some(looper.into());
        self
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task(mut self, task: u64) -> Self {
        self.task = Some(task);
        self
    }

    /// Attaches a worker tag.
    #[inline]
    pub fn with_tag(mut self, tag: Option<u64>) -> Self {
        self.tag = tag;
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a counter payload.
    #[inline]
    pub fn with_count(mut self, n: u64) -> Self {
        self.count = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    /// True for the per-task lifecycle kinds: starting, stopped, failed and skipped.
    ///
    /// Handy for subscribers that only follow task execution.
    #[inline]
    pub fn is_task_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskStarting
                | EventKind::TaskStopped
                | EventKind::TaskFailed
                | EventKind::TaskSkipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::LooperStarted);
        let b = Event::new(EventKind::LooperStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates_at_u32() {
        let ev = Event::new(EventKind::MessagePosted).with_delay(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn test_is_task_event() {
        assert!(Event::new(EventKind::TaskSkipped).is_task_event());
        assert!(!Event::new(EventKind::WorkerCreated).is_task_event());
    }
}
