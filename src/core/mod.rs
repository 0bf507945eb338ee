//! Runtime core: the execution queue and the thread that drains it.
//!
//! The public surface is [`Looper`] (handle), [`LooperBuilder`] (construction with
//! subscribers), [`LoopRunner`] (consumer side for host-owned threads) and
//! [`BarrierToken`].
//!
//! Internal modules:
//! - [`queue`]: ordered pending messages, removal by identity or tag, barriers, quit;
//! - [`runner`]: blocking dispatch loop plus the subscriber event thread;
//! - [`looper`]: clonable handle and the process-wide main looper slot;
//! - [`builder`]: `prepare` / `spawn`.

mod builder;
mod looper;
mod queue;
mod runner;

pub use builder::LooperBuilder;
pub use looper::Looper;
pub use queue::BarrierToken;
pub use runner::LoopRunner;

pub(crate) use queue::{MessageQueue, deadline};
