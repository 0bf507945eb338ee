//! # Dispatch loop of one looper.
//!
//! [`LoopRunner`] owns the consumer side of a [`MessageQueue`]: it pops and runs
//! tasks one at a time on the calling thread until the queue quits. When the
//! looper has subscribers, a companion event thread drives a current-thread
//! tokio runtime with the listener that feeds the looper's [`SubscriberSet`].
//!
//! ## Threads
//! ```text
//! looper thread (plain)                        event thread "<name>-events"
//! ─────────────────────                        ────────────────────────────
//! publish LooperStarted                        rt.block_on(listen)
//! while let Some(task) = queue.wait_next() {     loop { select! {
//!     publish TaskStarting                         bus.recv() ─► SubscriberSet::emit
//!     task.run() ─► TaskStopped | TaskFailed       token.cancelled() ─► break
//!                   | TaskSkipped                } }
//! }                                              drain bus ─► SubscriberSet::shutdown
//! publish LooperStopped ─► token.cancel() ───────►
//! join event thread
//! ```
//!
//! ## Rules
//! - Tasks run **sequentially** on the runner's thread, never in parallel.
//! - Tasks never run inside an async runtime, so work may block or drive its own runtime.
//! - A failing or panicking task never stops the loop.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::core::queue::MessageQueue;
use crate::error::RuntimeError;
use crate::events::{Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{Disposable, DisposableTask, RunOutcome, Tag};

/// Consumer side of a looper; call [`run`](LoopRunner::run) on the thread that
/// should execute the tasks.
pub struct LoopRunner {
    queue: Arc<MessageQueue>,
    rx: broadcast::Receiver<Event>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl LoopRunner {
    pub(crate) fn new(queue: Arc<MessageQueue>, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let rx = queue.bus().subscribe();
        Self {
            queue,
            rx,
            subscribers,
        }
    }

    /// Runs the loop on the current thread until the looper quits.
    ///
    /// Blocks the calling thread. Fails only if the event thread cannot be started.
    pub fn run(self) -> Result<(), RuntimeError> {
        let LoopRunner {
            queue,
            rx,
            subscribers,
        } = self;
        queue.bind_thread(std::thread::current().id());

        let events = if subscribers.is_empty() {
            None
        } else {
            Some(spawn_event_thread(&queue, rx, subscribers)?)
        };

        queue.bus().publish(queue.event(EventKind::LooperStarted));
        while let Some(task) = queue.wait_next() {
            dispatch(&queue, &task);
        }
        queue.bus().publish(queue.event(EventKind::LooperStopped));

        if let Some((token, handle)) = events {
            token.cancel();
            if handle.join().is_err() {
                tracing::error!(looper = queue.name(), "event thread panicked");
            }
        }
        Ok(())
    }
}

fn build_runtime() -> Result<Runtime, RuntimeError> {
    Builder::new_current_thread()
        .build()
        .map_err(|source| RuntimeError::Runtime { source })
}

/// Starts the thread that fans bus events out to the subscribers.
fn spawn_event_thread(
    queue: &MessageQueue,
    rx: broadcast::Receiver<Event>,
    subscribers: Vec<Arc<dyn Subscribe>>,
) -> Result<(CancellationToken, JoinHandle<()>), RuntimeError> {
    let rt = build_runtime()?;
    let name = format!("{}-events", queue.name());
    let bus = queue.bus().clone();
    let token = CancellationToken::new();
    let stop = token.clone();

    let handle = std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            rt.block_on(async move {
                let set = SubscriberSet::new(subscribers, bus);
                listen(rx, set, stop).await;
            });
        })
        .map_err(|source| RuntimeError::Spawn { name, source })?;
    Ok((token, handle))
}

/// Forwards bus events to the subscriber set until cancelled, then drains what is left.
async fn listen(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Ok(ev) => set.emit(&ev),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = token.cancelled() => break,
        }
    }
    while let Ok(ev) = rx.try_recv() {
        set.emit(&ev);
    }
    set.shutdown().await;
}

fn dispatch(queue: &MessageQueue, task: &DisposableTask) {
    let id = task.id().as_u64();
    let tag = task.tag().map(Tag::as_u64);
    let event = |kind: EventKind| queue.event(kind).with_task(id).with_tag(tag);

    if !task.has_started() && !task.is_disposed() {
        queue.bus().publish(event(EventKind::TaskStarting));
    }
    match task.run() {
        RunOutcome::Completed => queue.bus().publish(event(EventKind::TaskStopped)),
        RunOutcome::Skipped => queue.bus().publish(event(EventKind::TaskSkipped)),
        RunOutcome::Failed(err) => queue
            .bus()
            .publish(event(EventKind::TaskFailed).with_reason(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LooperConfig;
    use crate::core::Looper;
    use crate::error::TaskError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    struct Recorder {
        seen: Arc<Mutex<Vec<EventKind>>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, e: &Event) {
            self.seen.lock().push(e.kind);
        }
    }

    #[test]
    fn test_subscribers_see_the_whole_lifecycle() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Recorder {
            seen: Arc::clone(&seen),
        })];
        let (looper, runner) = Looper::builder(LooperConfig::named("runner-subs"))
            .with_subscribers(subs)
            .prepare();

        let task = DisposableTask::new(
            looper.queue(),
            None,
            Box::new(|| -> Result<(), TaskError> { Ok(()) }),
        );
        looper
            .queue()
            .enqueue(task, Instant::now(), None, false)
            .unwrap();
        looper.quit_safely();
        runner.run().unwrap();

        // The event thread is joined before `run` returns.
        let seen = seen.lock();
        assert!(seen.contains(&EventKind::MessagePosted));
        assert!(seen.contains(&EventKind::LooperStarted));
        assert!(seen.contains(&EventKind::TaskStarting));
        assert!(seen.contains(&EventKind::TaskStopped));
        assert_eq!(seen.last(), Some(&EventKind::LooperStopped));
    }

    #[test]
    fn test_task_may_drive_its_own_runtime() {
        let (looper, runner) = Looper::prepare(LooperConfig::named("runner-nested"));
        let (tx, rx) = std::sync::mpsc::channel();

        let task = DisposableTask::new(
            looper.queue(),
            None,
            Box::new(move || -> Result<(), TaskError> {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| TaskError::fail(e.to_string()))?;
                let value = rt.block_on(async {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    42
                });
                tx.send(value).unwrap();
                Ok(())
            }),
        );
        let observed = Arc::clone(&task);
        looper
            .queue()
            .enqueue(task, Instant::now(), None, false)
            .unwrap();
        looper.quit_safely();
        runner.run().unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        assert!(observed.has_started());
        assert!(!observed.is_disposed());
    }
}
