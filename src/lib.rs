//! # loopsched
//!
//! **loopsched** runs units of work on a single designated thread that owns a
//! delay-ordered message queue (a *looper*), and lets any number of other
//! threads schedule, delay and cancel that work without racing the looper.
//!
//! It adapts the reactive `Scheduler` / `Worker` / `Disposable` abstraction onto
//! such a queue: a scheduler facade posts one-off tasks, worker sessions post
//! tagged tasks that can be cancelled as a batch, and a process-wide error sink
//! receives whatever the work raises.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   submitter threads                                        looper thread
//!   ─────────────────                                        ─────────────
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │ MessageQueueScheduler│   │  MessageQueueWorker  │
//! │  schedule(f)         │   │  schedule(f), tag=T  │
//! │  schedule_delayed    │   │  dispose()           │
//! └──────────┬───────────┘   └──────┬─────────┬─────┘
//!            │ DisposableTask       │         │ remove_tagged(T)
//!            ▼                      ▼         ▼
//! ┌───────────────────────────────────────────────────┐
//! │ MessageQueue  (when, seq) ordered                 │
//! │  - delayed delivery    - sync barriers            │
//! │  - removal by id/tag   - quit / quit_safely       │
//! └──────────────────────────┬────────────────────────┘
//!                            ▼
//!                 ┌─────────────────────┐      ┌────────────────────┐
//!                 │ LoopRunner          │─────►│ DisposableTask::run│
//!                 │ (plain thread)      │      └─────────┬──────────┘
//!                 └─────────┬───────────┘                │ Err / panic
//!                           │ Events                     ▼
//!                           ▼                     ┌──────────────┐
//!                 ┌─────────────────────┐         │  error_sink  │
//!                 │ Bus ─► SubscriberSet│         │ handler/hooks│
//!                 │ (LogWriter, custom) │         └──────────────┘
//!                 └─────────────────────┘
//! ```
//!
//! ### Task lifecycle
//! ```text
//! schedule ──► enqueue ──► [pending] ──► run() on looper ──► Ok      ─► TaskStopped
//!                              │                         ├─► Err     ─► TaskFailed ─► error_sink
//!                              │                         └─► disposed ─► TaskSkipped
//!                              └─ dispose() / worker dispose / quit ─► removed, disposed
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                                  |
//! |-------------------|--------------------------------------------------------------------|-----------------------------------------------------|
//! | **Scheduling**    | Post immediate or delayed work to one thread.                      | [`Scheduler`], [`MessageQueueScheduler`]            |
//! | **Sessions**      | Batch cancellation of everything a session posted.                 | [`Worker`], [`MessageQueueWorker`], [`Tag`]         |
//! | **Cancellation**  | Idempotent, race-safe disposal.                                    | [`Disposable`], [`TaskHandle`], [`DisposableTask`]  |
//! | **Execution**     | Looper threads, host-owned loops, barriers, quit.                  | [`Looper`], [`LoopRunner`], [`BarrierToken`]        |
//! | **Errors**        | Typed errors and a process-wide sink.                              | [`ScheduleError`], [`TaskError`], [`error_sink`]    |
//! | **Subscriber API**| Hook into looper and task lifecycle events.                        | [`Subscribe`], [`Event`]                            |
//! | **Configuration** | Per-looper settings.                                               | [`LooperConfig`]                                    |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogWriter` subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::mpsc;
//! use std::time::Duration;
//! use loopsched::{Disposable, Looper, LooperConfig, MessageQueueScheduler, Scheduler, Worker};
//!
//! let looper = Looper::spawn(LooperConfig::named("ui")).unwrap();
//! let scheduler = MessageQueueScheduler::new(looper.clone());
//! let (tx, rx) = mpsc::channel();
//!
//! let worker = scheduler.create_worker();
//! let tx_never = tx.clone();
//! worker
//!     .schedule_delayed(move || { tx_never.send("never").unwrap(); Ok(()) }, Duration::from_secs(1))
//!     .unwrap();
//! worker.dispose();
//!
//! scheduler.schedule(move || { tx.send("hello").unwrap(); Ok(()) }).unwrap();
//! assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "hello");
//!
//! looper.quit();
//! looper.join();
//! ```
mod config;
mod core;
mod error;
pub mod error_sink;
mod events;
mod scheduler;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use config::LooperConfig;
pub use crate::core::{BarrierToken, LoopRunner, Looper, LooperBuilder};
pub use error::{RuntimeError, ScheduleError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use scheduler::{
    MessageQueueScheduler, MessageQueueWorker, Scheduler, Worker, from_looper,
    install_main_looper, main_thread,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{Disposable, DisposableTask, Tag, TaskHandle, TaskId, Work};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
