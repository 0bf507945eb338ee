//! # Looper: handle to one message queue and the thread that drains it.
//!
//! A [`Looper`] is a cheap, clonable handle. Schedulers hold one to post work;
//! none of them own the thread's lifecycle. The thread is either spawned by
//! [`Looper::spawn`] or supplied by the host through [`Looper::prepare`] +
//! [`LoopRunner::run`](crate::LoopRunner::run).
//!
//! ## Example
//! ```rust
//! use std::sync::mpsc;
//! use std::time::Duration;
//! use loopsched::{Looper, LooperConfig, MessageQueueScheduler, Scheduler};
//!
//! let looper = Looper::spawn(LooperConfig::named("doc-looper")).unwrap();
//! let scheduler = MessageQueueScheduler::new(looper.clone());
//!
//! let (tx, rx) = mpsc::channel();
//! scheduler
//!     .schedule(move || {
//!         tx.send(std::thread::current().name().map(str::to_owned)).unwrap();
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let ran_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
//! assert_eq!(ran_on.as_deref(), Some("doc-looper"));
//! looper.quit();
//! looper.join();
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;
use std::thread::{JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::{
    config::LooperConfig,
    core::{
        builder::LooperBuilder,
        queue::{BarrierToken, MessageQueue},
        runner::LoopRunner,
    },
    error::{RuntimeError, ScheduleError},
    events::Event,
};

/// Handle to a message queue and its consumer thread.
#[derive(Clone)]
pub struct Looper {
    queue: Arc<MessageQueue>,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Looper {
    /// Returns a builder for a looper with subscribers.
    pub fn builder(cfg: LooperConfig) -> LooperBuilder {
        LooperBuilder::new(cfg)
    }

    /// Spawns a looper thread without subscribers.
    pub fn spawn(cfg: LooperConfig) -> Result<Looper, RuntimeError> {
        LooperBuilder::new(cfg).spawn()
    }

    /// Creates a looper whose loop the caller runs on a thread of its choice.
    pub fn prepare(cfg: LooperConfig) -> (Looper, LoopRunner) {
        LooperBuilder::new(cfg).prepare()
    }

    pub(crate) fn from_queue(queue: Arc<MessageQueue>) -> Self {
        Self {
            queue,
            thread: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn attach_thread(&self, handle: JoinHandle<()>) {
        self.queue.bind_thread(handle.thread().id());
        *self.thread.lock() = Some(handle);
    }

    pub(crate) fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    /// Looper name (thread name for spawned loopers).
    pub fn name(&self) -> &str {
        self.queue.name()
    }

    /// Default async flag inherited by `MessageQueueScheduler::new`.
    pub fn async_messages(&self) -> bool {
        self.queue.async_default()
    }

    /// Id of the thread running the loop, once known.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.queue.thread_id()
    }

    /// True when called from the looper's own thread.
    pub fn is_current_thread(&self) -> bool {
        self.thread_id() == Some(std::thread::current().id())
    }

    /// Number of pending messages (tasks and barriers).
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Subscribes to this looper's events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.queue.bus().subscribe()
    }

    /// Inserts a sync barrier: synchronous messages posted after it are held back
    /// until [`remove_sync_barrier`](Looper::remove_sync_barrier); asynchronous
    /// messages pass.
    pub fn post_sync_barrier(&self) -> Result<BarrierToken, ScheduleError> {
        self.queue.post_sync_barrier()
    }

    /// Removes a sync barrier. Returns `false` if the token is unknown.
    pub fn remove_sync_barrier(&self, token: BarrierToken) -> bool {
        self.queue.remove_sync_barrier(token)
    }

    /// Stops the loop; every pending message is dropped and its task disposed.
    pub fn quit(&self) {
        self.queue.quit(false);
    }

    /// Stops the loop after delivering messages that are already due.
    pub fn quit_safely(&self) {
        self.queue.quit(true);
    }

    /// True after `quit` / `quit_safely`.
    pub fn is_quitting(&self) -> bool {
        self.queue.is_quitting()
    }

    /// Waits for a spawned looper thread to exit.
    ///
    /// Returns immediately for prepared loopers, when called from the looper
    /// thread itself, or when another caller already joined.
    pub fn join(&self) {
        if self.is_current_thread() {
            return;
        }
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!(looper = self.name(), "looper thread panicked");
            }
        }
    }

    /// Process-wide main looper.
    ///
    /// The first call either returns the looper registered with
    /// [`install_main`](Looper::install_main) or spawns a dedicated thread named
    /// `main`. Construction happens at most once.
    pub fn main() -> Result<Looper, RuntimeError> {
        main_slot::get_or_spawn()
    }

    /// Registers the host's own looper as the main looper.
    ///
    /// Fails (returning the looper) if a main looper already exists or is being created.
    pub fn install_main(looper: Looper) -> Result<(), Looper> {
        main_slot::install(looper)
    }
}

impl fmt::Debug for Looper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Looper")
            .field("name", &self.name())
            .field("thread", &self.thread_id())
            .field("pending", &self.pending())
            .finish()
    }
}

/// One-time, thread-safe construction of the main looper.
///
/// `STATE` is the guard (`UNINIT → INITIALIZING → READY`); the winner of the
/// compare-and-swap builds the looper and stores it in `MAIN`, everyone else
/// waits for `READY`. A failed spawn resets the guard so a later call can retry.
mod main_slot {
    use super::*;

    const UNINIT: u8 = 0;
    const INITIALIZING: u8 = 1;
    const READY: u8 = 2;

    static STATE: AtomicU8 = AtomicU8::new(UNINIT);
    static MAIN: OnceLock<Looper> = OnceLock::new();

    pub(super) fn get_or_spawn() -> Result<Looper, RuntimeError> {
        loop {
            if let Some(looper) = ready() {
                return Ok(looper);
            }
            if claim() {
                return match Looper::spawn(LooperConfig::named("main")) {
                    Ok(looper) => {
                        publish(looper.clone());
                        Ok(looper)
                    }
                    Err(err) => {
                        STATE.store(UNINIT, Ordering::Release);
                        Err(err)
                    }
                };
            }
            std::thread::yield_now();
        }
    }

    pub(super) fn install(looper: Looper) -> Result<(), Looper> {
        if claim() {
            publish(looper);
            Ok(())
        } else {
            Err(looper)
        }
    }

    fn ready() -> Option<Looper> {
        if STATE.load(Ordering::Acquire) == READY {
            MAIN.get().cloned()
        } else {
            None
        }
    }

    fn claim() -> bool {
        STATE
            .compare_exchange(UNINIT, INITIALIZING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn publish(looper: Looper) {
        let _ = MAIN.set(looper);
        STATE.store(READY, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::events::EventKind;
    use crate::tasks::{DisposableTask, Work};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    fn post_fn(looper: &Looper, work: Work) -> Arc<DisposableTask> {
        let task = DisposableTask::new(looper.queue(), None, work);
        looper
            .queue()
            .enqueue(Arc::clone(&task), Instant::now(), None, false)
            .unwrap();
        task
    }

    #[test]
    fn test_spawned_looper_runs_on_its_thread() {
        let looper = Looper::spawn(LooperConfig::named("looper-thread-test")).unwrap();
        assert!(looper.thread_id().is_some());
        assert!(!looper.is_current_thread());

        let (tx, rx) = mpsc::channel();
        let observer = looper.clone();
        post_fn(
            &looper,
            Box::new(move || -> Result<(), TaskError> {
                tx.send(observer.is_current_thread()).unwrap();
                Ok(())
            }),
        );
        assert!(rx.recv_timeout(WAIT).unwrap());

        looper.quit();
        looper.join();
    }

    #[test]
    fn test_prepared_looper_runs_on_host_thread() {
        let (looper, runner) = Looper::prepare(LooperConfig::named("host"));
        let (tx, rx) = mpsc::channel();
        post_fn(
            &looper,
            Box::new(move || -> Result<(), TaskError> {
                tx.send(std::thread::current().name().map(str::to_owned))
                    .unwrap();
                Ok(())
            }),
        );

        let host = std::thread::Builder::new()
            .name("host-thread".into())
            .spawn(move || runner.run())
            .unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap().as_deref(), Some("host-thread"));
        looper.quit();
        host.join().unwrap().unwrap();
    }

    #[test]
    fn test_lifecycle_events_are_published() {
        let looper = Looper::spawn(LooperConfig::named("events")).unwrap();
        let mut rx = looper.subscribe();

        let (tx, done) = mpsc::channel();
        let task = post_fn(
            &looper,
            Box::new(move || -> Result<(), TaskError> {
                tx.send(()).unwrap();
                Ok(())
            }),
        );
        done.recv_timeout(WAIT).unwrap();
        looper.quit();
        looper.join();

        let mut kinds = Vec::new();
        let mut seqs = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.task == Some(task.id().as_u64()) || ev.task.is_none() {
                kinds.push(ev.kind);
                seqs.push((ev.kind, ev.seq));
            }
        }
        let seq_of = |kind| seqs.iter().find(|(k, _)| *k == kind).map(|(_, s)| *s);
        assert!(
            seq_of(EventKind::MessagePosted).unwrap() < seq_of(EventKind::TaskStarting).unwrap()
        );
        assert!(kinds.contains(&EventKind::MessagePosted));
        assert!(kinds.contains(&EventKind::TaskStarting));
        assert!(kinds.contains(&EventKind::TaskStopped));
        assert_eq!(kinds.last(), Some(&EventKind::LooperStopped));
    }

    #[test]
    fn test_quit_from_inside_a_task() {
        let looper = Looper::spawn(LooperConfig::named("self-quit")).unwrap();
        let inner = looper.clone();
        post_fn(
            &looper,
            Box::new(move || -> Result<(), TaskError> {
                inner.quit();
                inner.join();
                Ok(())
            }),
        );
        looper.join();
        assert!(looper.is_quitting());
    }

    #[test]
    fn test_main_looper_is_constructed_once() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| Looper::main().unwrap().thread_id()))
            .collect();
        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.iter().all(|id| id.is_some() && *id == ids[0]));

        let main = Looper::main().unwrap();
        assert_eq!(main.name(), "main");
        let (other, _runner) = Looper::prepare(LooperConfig::named("late"));
        assert!(Looper::install_main(other).is_err());
    }
}
