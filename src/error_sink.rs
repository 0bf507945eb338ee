//! # Process-wide sink for errors raised by scheduled work.
//!
//! Work runs on a looper thread where there is no caller left to receive its
//! error. [`DisposableTask`](crate::DisposableTask) therefore hands every `Err`
//! and every caught panic to [`handle`], which routes it as follows:
//!
//! ```text
//! handle(err)
//!   ├─ error handler installed? ─► handler(thread, err)
//!   │                                 ├─ returns  ─► done
//!   │                                 └─ panics   ─► log + report_uncaught(panic)
//!   │                                                  └─► fall through
//!   └─ log err ─► report_uncaught(err)
//!
//! report_uncaught(err)
//!   err = err.unwrap_propagated()
//!   ├─ thread hook (set_uncaught_hook, current thread)   ─► hook(thread, err)
//!   ├─ default hook (set_default_uncaught_hook)          ─► hook(thread, err)
//!   └─ none                                              ─► dropped (the log line remains)
//! ```
//!
//! ## Rules
//! - The handler slot is last-write-wins; installing is safe from any thread.
//! - The handler is cloned out of its slot before it is called, so a handler
//!   may replace itself.
//! - Nothing here ever unwinds into the looper.
//!
//! ## Example
//! ```rust
//! use loopsched::{TaskError, error_sink};
//!
//! error_sink::set_error_handler(|thread, err: &TaskError| {
//!     eprintln!("[{}] {}", thread.name().unwrap_or("?"), err.as_message());
//! });
//! error_sink::clear_error_handler();
//! ```

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::Thread;

use parking_lot::{RwLock, const_rwlock};

use crate::error::TaskError;

/// Host callback receiving errors from scheduled work.
pub type ErrorHandler = Arc<dyn Fn(&Thread, &TaskError) + Send + Sync + 'static>;

/// Last-resort callback for errors nobody handled.
pub type UncaughtHook = Arc<dyn Fn(&Thread, &TaskError) + Send + Sync + 'static>;

static HANDLER: RwLock<Option<ErrorHandler>> = const_rwlock(None);
static DEFAULT_HOOK: RwLock<Option<UncaughtHook>> = const_rwlock(None);

thread_local! {
    static THREAD_HOOK: RefCell<Option<UncaughtHook>> = const { RefCell::new(None) };
}

/// Installs the process-wide error handler, replacing any previous one.
pub fn set_error_handler<F>(handler: F)
where
    F: Fn(&Thread, &TaskError) + Send + Sync + 'static,
{
    *HANDLER.write() = Some(Arc::new(handler));
}

/// Removes the process-wide error handler.
pub fn clear_error_handler() {
    *HANDLER.write() = None;
}

/// Installs an uncaught hook for the **current thread**.
///
/// Call it from a task running on the looper to cover that looper's errors.
pub fn set_uncaught_hook<F>(hook: F)
where
    F: Fn(&Thread, &TaskError) + Send + Sync + 'static,
{
    THREAD_HOOK.with(|slot| *slot.borrow_mut() = Some(Arc::new(hook)));
}

/// Removes the current thread's uncaught hook.
pub fn clear_uncaught_hook() {
    THREAD_HOOK.with(|slot| *slot.borrow_mut() = None);
}

/// Installs the uncaught hook used by threads that have none of their own.
pub fn set_default_uncaught_hook<F>(hook: F)
where
    F: Fn(&Thread, &TaskError) + Send + Sync + 'static,
{
    *DEFAULT_HOOK.write() = Some(Arc::new(hook));
}

/// Removes the process default uncaught hook.
pub fn clear_default_uncaught_hook() {
    *DEFAULT_HOOK.write() = None;
}

/// Routes an error raised by scheduled work.
pub fn handle(err: &TaskError) {
    let thread = std::thread::current();
    let handler = HANDLER.read().clone();

    if let Some(handler) = handler {
        match catch_unwind(AssertUnwindSafe(|| handler(&thread, err))) {
            Ok(()) => return,
            Err(payload) => {
                let panic = TaskError::from_panic(payload);
                tracing::error!(
                    thread = thread.name().unwrap_or("<unnamed>"),
                    error = %panic,
                    "error handler panicked"
                );
                report_uncaught(&thread, &panic);
            }
        }
    }

    tracing::error!(
        thread = thread.name().unwrap_or("<unnamed>"),
        label = err.as_label(),
        error = %err,
        "unhandled task error"
    );
    report_uncaught(&thread, err);
}

fn report_uncaught(thread: &Thread, err: &TaskError) {
    let err = err.unwrap_propagated();
    let hook = THREAD_HOOK
        .with(|slot| slot.borrow().clone())
        .or_else(|| DEFAULT_HOOK.read().clone());

    let Some(hook) = hook else {
        tracing::debug!(error = %err, "no uncaught hook; error dropped");
        return;
    };
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook(thread, err))) {
        tracing::error!(
            panic = %TaskError::from_panic(payload),
            "uncaught hook panicked; error dropped"
        );
    }
}

/// Serializes tests that install process-wide handlers.
#[cfg(test)]
pub(crate) fn test_lock() -> parking_lot::MutexGuard<'static, ()> {
    static LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());
    LOCK.lock()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&Thread, &TaskError) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |_: &Thread, err: &TaskError| {
            sink.lock().push(err.to_string())
        })
    }

    fn marked(seen: &Mutex<Vec<String>>, marker: &str) -> Vec<String> {
        seen.lock()
            .iter()
            .filter(|m| m.contains(marker))
            .cloned()
            .collect()
    }

    #[test]
    fn test_handler_receives_error_and_current_thread() {
        let _guard = test_lock();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        set_error_handler(move |thread, err| {
            sink.lock()
                .push((thread.name().map(str::to_owned), err.clone()));
        });

        std::thread::Builder::new()
            .name("sink-thread".into())
            .spawn(|| handle(&TaskError::fail("sink-handler-marker")))
            .unwrap()
            .join()
            .unwrap();
        clear_error_handler();

        let seen = seen.lock();
        let hit = seen
            .iter()
            .find(|(_, e)| e == &TaskError::fail("sink-handler-marker"))
            .expect("handler was not called");
        assert_eq!(hit.0.as_deref(), Some("sink-thread"));
    }

    #[test]
    fn test_handled_error_is_not_reported_uncaught() {
        let _guard = test_lock();
        let (uncaught, hook) = recorder();
        set_uncaught_hook(hook);
        set_error_handler(|_, _| {});

        handle(&TaskError::fail("sink-handled-marker"));
        clear_error_handler();
        clear_uncaught_hook();

        assert!(marked(&uncaught, "sink-handled-marker").is_empty());
    }

    #[test]
    fn test_panicking_handler_escalates_both_errors() {
        let _guard = test_lock();
        let (uncaught, hook) = recorder();
        set_uncaught_hook(hook);
        set_error_handler(|_, err| {
            if err.to_string().contains("sink-panic-marker") {
                panic!("handler broke on sink-panic-marker");
            }
        });

        handle(&TaskError::fail("sink-panic-marker"));
        clear_error_handler();
        clear_uncaught_hook();

        let got = marked(&uncaught, "sink-panic-marker");
        assert_eq!(got.len(), 2);
        assert!(got[0].starts_with("panicked: handler broke"));
        assert_eq!(got[1], "execution failed: sink-panic-marker");
    }

    #[test]
    fn test_uncaught_report_unwraps_propagated() {
        let _guard = test_lock();
        clear_error_handler();
        let (uncaught, hook) = recorder();
        set_uncaught_hook(hook);

        handle(&TaskError::fail("sink-unwrap-marker").propagate().propagate());
        clear_uncaught_hook();

        assert_eq!(
            marked(&uncaught, "sink-unwrap-marker"),
            vec!["execution failed: sink-unwrap-marker".to_string()]
        );
    }

    #[test]
    fn test_default_hook_covers_threads_without_their_own() {
        let _guard = test_lock();
        clear_error_handler();
        let (uncaught, hook) = recorder();
        set_default_uncaught_hook(hook);

        std::thread::spawn(|| handle(&TaskError::fail("sink-default-marker")))
            .join()
            .unwrap();
        clear_default_uncaught_hook();

        assert_eq!(marked(&uncaught, "sink-default-marker").len(), 1);
    }

    #[test]
    fn test_no_handler_and_no_hook_drops_silently() {
        let _guard = test_lock();
        clear_error_handler();
        clear_default_uncaught_hook();
        std::thread::spawn(|| handle(&TaskError::fail("sink-dropped-marker")))
            .join()
            .unwrap();
    }
}
