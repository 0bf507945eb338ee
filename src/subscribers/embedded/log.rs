//! # LogWriter: event logger
//!
//! A minimal subscriber that writes incoming [`Event`]s through `tracing`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO loopsched: [looper-started] looper="main"
//! DEBUG loopsched: [posted] looper="main" task=3 tag=Some(1) delay_ms=Some(100)
//! DEBUG loopsched: [removed] looper="main" task=None tag=Some(1) count=2
//! WARN loopsched: [failed] looper="main" task=4 err="execution failed: x"
//! INFO loopsched: [worker-disposed] looper="main" tag=1 purged=2
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let looper = e.looper.as_deref().unwrap_or("?");
        match e.kind {
            EventKind::LooperStarted => {
                tracing::info!("[looper-started] looper={looper:?}");
            }
            EventKind::LooperStopped => {
                tracing::info!("[looper-stopped] looper={looper:?}");
            }
            EventKind::BarrierPosted => {
                tracing::debug!("[barrier] looper={looper:?} token={:?}", e.count);
            }
            EventKind::BarrierRemoved => {
                tracing::debug!("[barrier-removed] looper={looper:?} token={:?}", e.count);
            }
            EventKind::MessagePosted => {
                tracing::debug!(
                    "[posted] looper={looper:?} task={:?} tag={:?} delay_ms={:?}",
                    e.task,
                    e.tag,
                    e.delay_ms
                );
            }
            EventKind::MessagesRemoved => {
                tracing::debug!(
                    "[removed] looper={looper:?} task={:?} tag={:?} count={:?}",
                    e.task,
                    e.tag,
                    e.count
                );
            }
            EventKind::TaskStarting => {
                tracing::trace!("[starting] looper={looper:?} task={:?}", e.task);
            }
            EventKind::TaskStopped => {
                tracing::trace!("[stopped] looper={looper:?} task={:?}", e.task);
            }
            EventKind::TaskSkipped => {
                tracing::debug!("[skipped] looper={looper:?} task={:?}", e.task);
            }
            EventKind::TaskFailed => {
                tracing::warn!(
                    "[failed] looper={looper:?} task={:?} err={:?}",
                    e.task,
                    e.reason
                );
            }
            EventKind::WorkerCreated => {
                tracing::debug!("[worker-created] looper={looper:?} tag={:?}", e.tag);
            }
            EventKind::WorkerDisposed => {
                tracing::info!(
                    "[worker-disposed] looper={looper:?} tag={:?} purged={:?}",
                    e.tag,
                    e.count
                );
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!("[subscriber-overflow] {:?}", e.reason);
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(
                    "[subscriber-panicked] {}",
                    e.reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
