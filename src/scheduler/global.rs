//! # Process-wide scheduler entry points.

use std::sync::OnceLock;

use crate::core::Looper;
use crate::error::RuntimeError;
use crate::scheduler::MessageQueueScheduler;

static MAIN_THREAD: OnceLock<MessageQueueScheduler> = OnceLock::new();

/// Scheduler that runs work on the process's main looper.
///
/// Constructed on first use: binds to the looper registered through
/// [`install_main_looper`], or spawns a dedicated looper thread named `main`.
/// Every call returns the same instance. Messages are synchronous.
///
/// # Errors
/// Fails only if the main looper thread has to be spawned and cannot be.
pub fn main_thread() -> Result<&'static MessageQueueScheduler, RuntimeError> {
    if let Some(scheduler) = MAIN_THREAD.get() {
        return Ok(scheduler);
    }
    let looper = Looper::main()?;
    Ok(MAIN_THREAD.get_or_init(|| MessageQueueScheduler::with_async(looper, false)))
}

/// Registers `looper` as the main looper before [`main_thread`] is first used.
///
/// Returns the looper back if a main looper already exists.
pub fn install_main_looper(looper: Looper) -> Result<(), Looper> {
    Looper::install_main(looper)
}

/// Scheduler posting to `looper`; `asynchronous` marks every message as exempt
/// from sync barriers.
pub fn from_looper(looper: Looper, asynchronous: bool) -> MessageQueueScheduler {
    MessageQueueScheduler::with_async(looper, asynchronous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LooperConfig;
    use crate::scheduler::Scheduler;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_main_thread_is_a_singleton() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| main_thread().unwrap() as *const _ as usize))
            .collect();
        let ptrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ptrs.iter().all(|p| *p == ptrs[0]));

        let scheduler = main_thread().unwrap();
        assert_eq!(scheduler.looper().name(), "main");
        assert!(!scheduler.is_async());

        let (tx, rx) = mpsc::channel();
        scheduler
            .schedule(move || {
                tx.send(std::thread::current().name().map(str::to_owned))
                    .unwrap();
                Ok(())
            })
            .unwrap();
        let ran_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(ran_on.as_deref(), Some("main"));
    }

    #[test]
    fn test_from_looper_sets_async_flag() {
        let (looper, _runner) = Looper::prepare(LooperConfig::named("from-looper"));
        assert!(from_looper(looper.clone(), true).is_async());
        assert!(!from_looper(looper, false).is_async());
    }
}
