//! # Scheduler bound to one looper.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::{Looper, deadline};
use crate::error::{ScheduleError, TaskError};
use crate::scheduler::{MessageQueueWorker, Scheduler};
use crate::tasks::{DisposableTask, Tag, TaskHandle, Work};

/// Scheduler that posts every unit of work to one [`Looper`].
///
/// Tasks posted directly carry no tag and can only be cancelled through their
/// own [`TaskHandle`]. Use [`create_worker`](Scheduler::create_worker) for work
/// that should be cancelled as a batch.
#[derive(Clone, Debug)]
pub struct MessageQueueScheduler {
    looper: Looper,
    asynchronous: bool,
}

impl MessageQueueScheduler {
    /// Scheduler inheriting the looper's default async flag.
    pub fn new(looper: Looper) -> Self {
        let asynchronous = looper.async_messages();
        Self::with_async(looper, asynchronous)
    }

    /// Scheduler whose messages are all asynchronous (`true`) or all synchronous (`false`).
    pub fn with_async(looper: Looper, asynchronous: bool) -> Self {
        Self {
            looper,
            asynchronous,
        }
    }

    /// The looper this scheduler posts to.
    pub fn looper(&self) -> &Looper {
        &self.looper
    }

    /// Whether posted messages are exempt from sync barriers.
    pub fn is_async(&self) -> bool {
        self.asynchronous
    }
}

impl Scheduler for MessageQueueScheduler {
    type Worker = MessageQueueWorker;

    fn schedule<F>(&self, work: F) -> Result<TaskHandle, ScheduleError>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        let when = deadline(None)?;
        post(&self.looper, None, Box::new(work), when, None, self.asynchronous)
            .map(TaskHandle::live)
    }

    fn schedule_delayed<F>(&self, work: F, delay: Duration) -> Result<TaskHandle, ScheduleError>
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        let when = deadline(Some(delay))?;
        post(
            &self.looper,
            None,
            Box::new(work),
            when,
            Some(delay),
            self.asynchronous,
        )
        .map(TaskHandle::live)
    }

    fn create_worker(&self) -> MessageQueueWorker {
        MessageQueueWorker::new(self.looper.clone(), self.asynchronous)
    }
}

/// Wraps `work` and enqueues it on `looper` to become eligible at `when`.
///
/// Callers validate the delay through [`deadline`] first, so a rejected call
/// leaves no trace in the queue.
pub(super) fn post(
    looper: &Looper,
    tag: Option<Tag>,
    work: Work,
    when: Instant,
    delay: Option<Duration>,
    asynchronous: bool,
) -> Result<Arc<DisposableTask>, ScheduleError> {
    let task = DisposableTask::new(looper.queue(), tag, work);
    looper
        .queue()
        .enqueue(Arc::clone(&task), when, delay, asynchronous)?;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LooperConfig;
    use crate::error_sink;
    use crate::tasks::Disposable;
    use std::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(5);

    fn looper(name: &str) -> Looper {
        Looper::spawn(LooperConfig::named(name)).unwrap()
    }

    #[test]
    fn test_immediate_tasks_run_in_submission_order() {
        let looper = looper("sched-fifo");
        let scheduler = MessageQueueScheduler::new(looper.clone());
        let (tx, rx) = mpsc::channel();

        for i in 0..50 {
            let tx = tx.clone();
            scheduler
                .schedule(move || {
                    tx.send(i).unwrap();
                    Ok(())
                })
                .unwrap();
        }
        let got: Vec<i32> = (0..50).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(got, (0..50).collect::<Vec<_>>());

        looper.quit();
        looper.join();
    }

    #[test]
    fn test_delayed_task_runs_after_immediate_one() {
        let looper = looper("sched-delay");
        let scheduler = MessageQueueScheduler::new(looper.clone());
        let (tx, rx) = mpsc::channel();

        let tx_late = tx.clone();
        scheduler
            .schedule_delayed(
                move || {
                    tx_late.send("late").unwrap();
                    Ok(())
                },
                Duration::from_millis(50),
            )
            .unwrap();
        scheduler
            .schedule(move || {
                tx.send("now").unwrap();
                Ok(())
            })
            .unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "now");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "late");
        looper.quit();
        looper.join();
    }

    #[test]
    fn test_disposed_handle_prevents_run() {
        let looper = looper("sched-dispose");
        let scheduler = MessageQueueScheduler::new(looper.clone());
        let (tx, rx) = mpsc::channel::<&str>();

        let tx_cancel = tx.clone();
        let handle = scheduler
            .schedule_delayed(
                move || {
                    tx_cancel.send("cancelled").unwrap();
                    Ok(())
                },
                Duration::from_millis(100),
            )
            .unwrap();
        handle.dispose();
        assert!(handle.is_disposed());

        scheduler
            .schedule_delayed(
                move || {
                    tx.send("marker").unwrap();
                    Ok(())
                },
                Duration::from_millis(150),
            )
            .unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "marker");
        assert!(rx.try_recv().is_err());

        looper.quit();
        looper.join();
    }

    #[test]
    fn test_failing_task_does_not_stop_later_tasks() {
        let _guard = error_sink::test_lock();
        error_sink::clear_error_handler();

        let looper = looper("sched-fail");
        let scheduler = MessageQueueScheduler::new(looper.clone());
        let (tx, rx) = mpsc::channel();

        scheduler
            .schedule(|| Err(TaskError::fail("sched-fail: expected")))
            .unwrap();
        scheduler
            .schedule(|| -> Result<(), TaskError> { panic!("sched-fail: expected panic") })
            .unwrap();
        scheduler
            .schedule(move || {
                tx.send(()).unwrap();
                Ok(())
            })
            .unwrap();

        rx.recv_timeout(WAIT).unwrap();
        looper.quit();
        looper.join();
    }

    #[test]
    fn test_task_errors_reach_the_installed_handler_once() {
        let _guard = error_sink::test_lock();
        let handled = Arc::new(parking_lot::Mutex::new(Vec::<(String, String)>::new()));
        let uncaught = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));

        let sink = Arc::clone(&handled);
        error_sink::set_error_handler(move |thread, err| {
            let name = thread.name().unwrap_or_default().to_owned();
            if name == "sched-sink" {
                sink.lock().push((name, err.to_string()));
            }
        });

        let looper = looper("sched-sink");
        let scheduler = MessageQueueScheduler::new(looper.clone());
        let (tx, rx) = mpsc::channel();

        let hook = Arc::clone(&uncaught);
        scheduler
            .schedule(move || {
                error_sink::set_uncaught_hook(move |_, err| hook.lock().push(err.to_string()));
                Ok(())
            })
            .unwrap();
        scheduler
            .schedule(|| Err(TaskError::fail("sched-sink: failed")))
            .unwrap();
        scheduler
            .schedule(|| -> Result<(), TaskError> { panic!("sched-sink: panicked") })
            .unwrap();
        scheduler
            .schedule(move || {
                error_sink::clear_uncaught_hook();
                tx.send(()).unwrap();
                Ok(())
            })
            .unwrap();

        rx.recv_timeout(WAIT).unwrap();
        error_sink::clear_error_handler();
        looper.quit();
        looper.join();

        let handled = handled.lock();
        assert_eq!(
            *handled,
            vec![
                (
                    "sched-sink".to_owned(),
                    "execution failed: sched-sink: failed".to_owned()
                ),
                (
                    "sched-sink".to_owned(),
                    "panicked: sched-sink: panicked".to_owned()
                ),
            ]
        );
        assert!(uncaught.lock().is_empty());
    }

    #[test]
    fn test_invalid_delay_is_rejected_before_enqueue() {
        let (looper, _runner) = Looper::prepare(LooperConfig::named("sched-invalid"));
        let scheduler = MessageQueueScheduler::new(looper.clone());

        let err = scheduler
            .schedule_delayed(|| Ok(()), Duration::MAX)
            .unwrap_err();
        assert_eq!(
            err,
            ScheduleError::InvalidDelay {
                delay: Duration::MAX
            }
        );
        assert_eq!(looper.pending(), 0);
    }

    #[test]
    fn test_schedule_on_quit_looper_fails() {
        let (looper, _runner) = Looper::prepare(LooperConfig::named("sched-closed"));
        let scheduler = MessageQueueScheduler::new(looper.clone());
        looper.quit();

        let err = scheduler.schedule(|| Ok(())).unwrap_err();
        assert_eq!(err.as_label(), "schedule_queue_closed");
    }

    #[test]
    fn test_async_flag_follows_looper_config() {
        let cfg = LooperConfig {
            async_messages: true,
            ..LooperConfig::named("sched-async")
        };
        let (looper, _runner) = Looper::prepare(cfg);
        assert!(MessageQueueScheduler::new(looper.clone()).is_async());
        assert!(!MessageQueueScheduler::with_async(looper, false).is_async());
    }

    #[test]
    fn test_async_messages_pass_a_sync_barrier() {
        let looper = looper("sched-barrier");
        let sync = MessageQueueScheduler::with_async(looper.clone(), false);
        let asynchronous = MessageQueueScheduler::with_async(looper.clone(), true);
        let (tx, rx) = mpsc::channel();

        let token = looper.post_sync_barrier().unwrap();
        let tx_sync = tx.clone();
        sync.schedule(move || {
            tx_sync.send("sync").unwrap();
            Ok(())
        })
        .unwrap();
        asynchronous
            .schedule(move || {
                tx.send("async").unwrap();
                Ok(())
            })
            .unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "async");
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(looper.remove_sync_barrier(token));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "sync");

        looper.quit();
        looper.join();
    }
}
