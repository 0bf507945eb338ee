//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by loopers, schedulers,
//! worker sessions and the tasks they run.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `MessageQueue` (post/remove/barriers), the dispatch loop
//!   (task lifecycle), `MessageQueueWorker` (create/dispose), `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: the loop listener spawned by `LoopRunner::run`, which fans
//!   events out to the looper's `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
