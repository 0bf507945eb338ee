//! # Looper configuration.
//!
//! Provides [`LooperConfig`] centralized settings for one looper thread.
//!
//! Config is used in two ways:
//! 1. **Looper creation**: `Looper::spawn(config)` / `Looper::builder(config)`
//! 2. **Scheduler defaults**: `MessageQueueScheduler::new(looper)` inherits
//!    `async_messages` from the looper it is bound to.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1

/// Configuration for a looper thread and its message queue.
///
/// ## Field semantics
/// - `name`: Thread name of the spawned looper (also used in logs and errors)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `async_messages`: Default for schedulers bound via `MessageQueueScheduler::new`
#[derive(Clone, Debug)]
pub struct LooperConfig {
    /// Name of the looper thread.
    pub name: String,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Whether schedulers created with defaults post asynchronous messages
    /// (exempt from sync barriers).
    pub async_messages: bool,
}

impl LooperConfig {
    /// Creates a config with the given thread name and defaults otherwise.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for LooperConfig {
    /// Default configuration:
    ///
    /// - `name = "looper"`
    /// - `bus_capacity = 1024`
    /// - `async_messages = false`
    fn default() -> Self {
        Self {
            name: "looper".to_string(),
            bus_capacity: 1024,
            async_messages: false,
        }
    }
}
