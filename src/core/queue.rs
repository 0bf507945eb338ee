//! # Message queue owned by one looper.
//!
//! Holds pending messages ordered by `(when, seq)` and answers the dispatch
//! loop's "what next?" question. All mutation happens under one short
//! `parking_lot::Mutex`; nothing here runs user work.
//!
//! ## Ordering
//! ```text
//! key = (deadline, seq)         seq increases per enqueue
//!   post(a)        → (t0, 0)
//!   post(b)        → (t0', 1)   t0' >= t0  → FIFO among immediate posts
//!   post_delayed(c, 100ms) → (t0''+100ms, 2)
//! ```
//!
//! Task messages are also indexed by [`TaskId`], so removal by identity does not
//! scan the queue.
//!
//! ## Sync barriers
//! A barrier is a message without a task. While a *due* barrier heads the queue,
//! only asynchronous task messages are eligible; synchronous ones wait until the
//! barrier is removed.
//!
//! ## Quit
//! - `quit(false)`: drop every pending message, loop exits on next poll.
//! - `quit(true)`: drop only messages that are not due yet; due ones still run.
//!
//! Every task dropped without running is marked disposed. Tasks are always
//! disposed after the lock is released, since dropping their work runs user code.
//!
//! ## Waiting
//! The consumer blocks in [`MessageQueue::wait_next`] on a `parking_lot::Condvar`
//! tied to the queue mutex, so a post between "nothing is due" and "sleep" cannot
//! be missed. The consumer is a plain thread: user work never runs inside an
//! async runtime.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::LooperConfig;
use crate::error::ScheduleError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{DisposableTask, Tag, TaskId};

/// Token identifying a sync barrier; pass it back to remove the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BarrierToken(u64);

impl BarrierToken {
    /// Raw value (for logs and events).
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Converts an optional delay into an absolute deadline.
///
/// Fails with [`ScheduleError::InvalidDelay`] when the deadline overflows the clock.
pub(crate) fn deadline(delay: Option<Duration>) -> Result<Instant, ScheduleError> {
    let now = Instant::now();
    match delay {
        None => Ok(now),
        Some(delay) => now
            .checked_add(delay)
            .ok_or(ScheduleError::InvalidDelay { delay }),
    }
}

type MessageKey = (Instant, u64);

enum Message {
    Task {
        task: Arc<DisposableTask>,
        asynchronous: bool,
    },
    Barrier(BarrierToken),
}

impl Message {
    fn is_async_task(&self) -> bool {
        matches!(
            self,
            Message::Task {
                asynchronous: true,
                ..
            }
        )
    }

    fn into_task(self) -> Option<Arc<DisposableTask>> {
        match self {
            Message::Task { task, .. } => Some(task),
            Message::Barrier(_) => None,
        }
    }
}

struct QueueState {
    messages: BTreeMap<MessageKey, Message>,
    by_task: HashMap<TaskId, MessageKey>,
    next_seq: u64,
    next_barrier: u64,
    quitting: bool,
}

impl QueueState {
    fn next_key(&mut self, when: Instant) -> MessageKey {
        let seq = self.next_seq;
        self.next_seq += 1;
        (when, seq)
    }

    fn insert(&mut self, key: MessageKey, msg: Message) {
        if let Message::Task { task, .. } = &msg {
            self.by_task.insert(task.id(), key);
        }
        self.messages.insert(key, msg);
    }

    fn remove(&mut self, key: MessageKey) -> Option<Message> {
        let msg = self.messages.remove(&key)?;
        if let Message::Task { task, .. } = &msg {
            self.by_task.remove(&task.id());
        }
        Some(msg)
    }

    fn take(&mut self, key: MessageKey) -> Next {
        match self.remove(key).and_then(Message::into_task) {
            Some(task) => Next::Ready(task),
            None => Next::Idle,
        }
    }

    /// Removes all messages matching `pred`, returning their tasks.
    fn remove_where(
        &mut self,
        mut pred: impl FnMut(&MessageKey, &Message) -> bool,
    ) -> Vec<Arc<DisposableTask>> {
        let keys: Vec<MessageKey> = self
            .messages
            .iter()
            .filter(|(k, m)| pred(*k, *m))
            .map(|(k, _)| *k)
            .collect();
        keys.into_iter()
            .filter_map(|k| self.remove(k))
            .filter_map(Message::into_task)
            .collect()
    }

    /// Picks the next message to dispatch at `now`.
    ///
    /// On `Quit`, every leftover message has been drained into `leftover`.
    fn next(&mut self, now: Instant, leftover: &mut Vec<Arc<DisposableTask>>) -> Next {
        let Some((&head_key, head)) = self.messages.first_key_value() else {
            return if self.quitting { Next::Quit } else { Next::Idle };
        };

        let candidate = if matches!(head, Message::Barrier(_)) && head_key.0 <= now {
            self.messages
                .iter()
                .find(|(_, m)| m.is_async_task())
                .map(|(k, _)| *k)
        } else {
            Some(head_key)
        };

        match candidate {
            Some(key) if key.0 <= now => self.take(key),
            Some(key) if !self.quitting => Next::WaitUntil(key.0),
            None if !self.quitting => Next::Idle,
            _ => {
                leftover.extend(self.remove_where(|_, _| true));
                Next::Quit
            }
        }
    }
}

/// Answer of [`MessageQueue::next`].
pub(crate) enum Next {
    /// A task is due; run it now.
    Ready(Arc<DisposableTask>),
    /// Nothing is due before this instant.
    WaitUntil(Instant),
    /// Nothing eligible; wait for a wake-up.
    Idle,
    /// The queue is quitting and nothing else will run.
    Quit,
}

/// Thread-safe message queue with delayed delivery, removal and sync barriers.
pub(crate) struct MessageQueue {
    name: Arc<str>,
    async_default: bool,
    state: Mutex<QueueState>,
    wake: Condvar,
    bus: Bus,
    thread: OnceLock<ThreadId>,
}

impl MessageQueue {
    pub(crate) fn new(cfg: &LooperConfig) -> Arc<Self> {
        Arc::new(Self {
            name: Arc::from(cfg.name.as_str()),
            async_default: cfg.async_messages,
            state: Mutex::new(QueueState {
                messages: BTreeMap::new(),
                by_task: HashMap::new(),
                next_seq: 0,
                next_barrier: 1,
                quitting: false,
            }),
            wake: Condvar::new(),
            bus: Bus::new(cfg.bus_capacity_clamped()),
            thread: OnceLock::new(),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn async_default(&self) -> bool {
        self.async_default
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_looper(Arc::clone(&self.name))
    }

    pub(crate) fn bind_thread(&self, id: ThreadId) {
        let _ = self.thread.set(id);
    }

    pub(crate) fn thread_id(&self) -> Option<ThreadId> {
        self.thread.get().copied()
    }

    pub(crate) fn is_quitting(&self) -> bool {
        self.state.lock().quitting
    }

    /// Number of pending messages (tasks and barriers).
    pub(crate) fn pending(&self) -> usize {
        self.state.lock().messages.len()
    }

    /// Enqueues `task` to become eligible at `when`.
    ///
    /// On a quitting queue the task is marked disposed and `QueueClosed` is returned.
    pub(crate) fn enqueue(
        &self,
        task: Arc<DisposableTask>,
        when: Instant,
        delay: Option<Duration>,
        asynchronous: bool,
    ) -> Result<(), ScheduleError> {
        // Sequenced before the message becomes visible to the consumer.
        let mut posted = self
            .event(EventKind::MessagePosted)
            .with_task(task.id().as_u64())
            .with_tag(task.tag().map(Tag::as_u64));
        if let Some(d) = delay {
            posted = posted.with_delay(d);
        }

        {
            let mut st = self.state.lock();
            if st.quitting {
                drop(st);
                task.mark_disposed();
                return Err(ScheduleError::QueueClosed {
                    looper: self.name.to_string(),
                });
            }
            let key = st.next_key(when);
            st.insert(key, Message::Task { task, asynchronous });
        }
        self.bus.publish(posted);
        self.wake.notify_one();
        Ok(())
    }

    /// Removes the pending message carrying task `id`. Returns the number removed (0 or 1).
    pub(crate) fn remove_task(&self, id: TaskId) -> usize {
        let removed = {
            let mut st = self.state.lock();
            let key = st.by_task.get(&id).copied();
            key.and_then(|key| st.remove(key))
                .and_then(Message::into_task)
        };
        let Some(task) = removed else {
            return 0;
        };
        task.mark_disposed();
        self.bus.publish(
            self.event(EventKind::MessagesRemoved)
                .with_task(id.as_u64())
                .with_count(1),
        );
        1
    }

    /// Removes every pending task tagged with `tag`. Returns the number removed.
    pub(crate) fn remove_tagged(&self, tag: Tag) -> usize {
        let removed = self.state.lock().remove_where(|_, m| {
            matches!(m, Message::Task { task, .. } if task.tag() == Some(tag))
        });
        let n = removed.len();
        Self::dispose_all(removed);
        if n > 0 {
            self.bus.publish(
                self.event(EventKind::MessagesRemoved)
                    .with_tag(Some(tag.as_u64()))
                    .with_count(n as u64),
            );
        }
        n
    }

    /// Inserts a sync barrier at the current time.
    pub(crate) fn post_sync_barrier(&self) -> Result<BarrierToken, ScheduleError> {
        let token = {
            let mut st = self.state.lock();
            if st.quitting {
                return Err(ScheduleError::QueueClosed {
                    looper: self.name.to_string(),
                });
            }
            let token = BarrierToken(st.next_barrier);
            st.next_barrier += 1;
            let key = st.next_key(Instant::now());
            st.insert(key, Message::Barrier(token));
            token
        };
        self.bus
            .publish(self.event(EventKind::BarrierPosted).with_count(token.as_u64()));
        Ok(token)
    }

    /// Removes a sync barrier. Returns `false` if the token is unknown.
    pub(crate) fn remove_sync_barrier(&self, token: BarrierToken) -> bool {
        let removed = {
            let mut st = self.state.lock();
            let key = st
                .messages
                .iter()
                .find(|(_, m)| matches!(m, Message::Barrier(t) if *t == token))
                .map(|(k, _)| *k);
            key.and_then(|k| st.remove(k)).is_some()
        };
        if removed {
            self.wake.notify_one();
            self.bus
                .publish(self.event(EventKind::BarrierRemoved).with_count(token.as_u64()));
        }
        removed
    }

    /// Starts quitting. With `safely`, messages already due are still delivered.
    pub(crate) fn quit(&self, safely: bool) {
        let removed = {
            let mut st = self.state.lock();
            if st.quitting {
                return;
            }
            st.quitting = true;
            if safely {
                let now = Instant::now();
                st.remove_where(|(when, _), _| *when > now)
            } else {
                st.remove_where(|_, _| true)
            }
        };
        Self::dispose_all(removed);
        self.wake.notify_one();
    }

    /// Picks the next message to dispatch at `now` without blocking.
    pub(crate) fn next(&self, now: Instant) -> Next {
        let mut leftover = Vec::new();
        let next = self.state.lock().next(now, &mut leftover);
        Self::dispose_all(leftover);
        next
    }

    /// Blocks the calling thread until a task is due, or returns `None` once the
    /// queue has quit and nothing else will run.
    pub(crate) fn wait_next(&self) -> Option<Arc<DisposableTask>> {
        let mut leftover = Vec::new();
        let mut st = self.state.lock();
        let ready = loop {
            match st.next(Instant::now(), &mut leftover) {
                Next::Ready(task) => break Some(task),
                Next::WaitUntil(when) => {
                    let _ = self.wake.wait_until(&mut st, when);
                }
                Next::Idle => self.wake.wait(&mut st),
                Next::Quit => break None,
            }
        };
        drop(st);
        Self::dispose_all(leftover);
        ready
    }

    fn dispose_all(tasks: Vec<Arc<DisposableTask>>) {
        for task in tasks {
            task.mark_disposed();
        }
    }

    #[cfg(test)]
    fn indexed(&self) -> usize {
        self.state.lock().by_task.len()
    }
}
