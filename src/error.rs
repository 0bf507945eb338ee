//! Error types used by the loopsched runtime and scheduled work.
//!
//! This module defines three enums:
//!
//! - [`ScheduleError`]: synchronous errors returned to the caller of `schedule`.
//! - [`TaskError`]: errors raised by scheduled work; they never leave the looper
//!   thread and are routed to the [error sink](crate::error_sink).
//! - [`RuntimeError`]: failures of the looper runtime itself (thread spawn, runtime build).
//!
//! All of them provide `as_label` / `as_message` helpers for logs.

use std::time::Duration;
use thiserror::Error;

/// # Errors returned synchronously by `schedule` calls.
///
/// These are signalled to the submitting thread before (or instead of) any
/// queue interaction taking effect.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The requested delay cannot be turned into a deadline (overflows `Instant`).
    #[error("invalid delay {delay:?}: deadline overflows the clock")]
    InvalidDelay {
        /// The rejected delay.
        delay: Duration,
    },

    /// The target looper has quit and no longer accepts messages.
    #[error("looper '{looper}' has quit; message rejected")]
    QueueClosed {
        /// Name of the looper thread.
        looper: String,
    },
}

impl ScheduleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use loopsched::ScheduleError;
    /// use std::time::Duration;
    ///
    /// let err = ScheduleError::InvalidDelay { delay: Duration::MAX };
    /// assert_eq!(err.as_label(), "schedule_invalid_delay");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ScheduleError::InvalidDelay { .. } => "schedule_invalid_delay",
            ScheduleError::QueueClosed { .. } => "schedule_queue_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ScheduleError::InvalidDelay { delay } => format!("invalid delay: {delay:?}"),
            ScheduleError::QueueClosed { looper } => format!("queue closed: {looper}"),
        }
    }
}

/// # Errors produced by scheduled work.
///
/// Work returns `Result<(), TaskError>`; panics are caught and converted into
/// [`TaskError::Panicked`]. Upstream layers may wrap an error in
/// [`TaskError::Propagated`]; uncaught reporting strips those layers via
/// [`TaskError::unwrap_propagated`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Work returned an error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Work panicked.
    #[error("panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// Error re-thrown by an upstream pipeline stage.
    #[error("propagated: {source}")]
    Propagated {
        /// The original error.
        #[source]
        source: Box<TaskError>,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Wraps `self` in one [`TaskError::Propagated`] layer.
    pub fn propagate(self) -> Self {
        TaskError::Propagated {
            source: Box::new(self),
        }
    }

    /// Strips every [`TaskError::Propagated`] layer and returns the innermost error.
    ///
    /// # Example
    /// ```
    /// use loopsched::TaskError;
    ///
    /// let err = TaskError::fail("x").propagate().propagate();
    /// assert_eq!(err.unwrap_propagated(), &TaskError::fail("x"));
    /// ```
    pub fn unwrap_propagated(&self) -> &TaskError {
        let mut cur = self;
        while let TaskError::Propagated { source } = cur {
            cur = source;
        }
        cur
    }

    /// Builds a [`TaskError::Panicked`] from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        TaskError::Panicked {
            message: panic_message(payload.as_ref()),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Propagated { .. } => "task_propagated",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { message } => format!("panic: {message}"),
            TaskError::Propagated { .. } => self.unwrap_propagated().as_message(),
        }
    }
}

/// Renders a panic payload (`&str` / `String`, anything else is opaque).
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// # Errors produced by the looper runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The looper thread could not be spawned.
    #[error("failed to spawn looper thread '{name}': {source}")]
    Spawn {
        /// Requested thread name.
        name: String,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The tokio runtime of the subscriber event thread could not be built.
    #[error("failed to build loop runtime: {source}")]
    Runtime {
        /// Builder error.
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Spawn { .. } => "runtime_spawn_failed",
            RuntimeError::Runtime { .. } => "runtime_build_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::Spawn { name, source } => format!("spawn '{name}': {source}"),
            RuntimeError::Runtime { source } => format!("runtime: {source}"),
        }
    }
}
