use std::sync::Arc;

use crate::{
    config::LooperConfig,
    core::{looper::Looper, queue::MessageQueue, runner::LoopRunner},
    error::RuntimeError,
    subscribers::Subscribe,
};

/// Builder for constructing a [`Looper`] with optional subscribers.
pub struct LooperBuilder {
    cfg: LooperConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl LooperBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: LooperConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive looper events (posts, removals, task lifecycle)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Creates the queue without starting a thread.
    ///
    /// The returned [`LoopRunner`] must be run on the thread that should execute
    /// tasks; until then, posted tasks just accumulate.
    pub fn prepare(self) -> (Looper, LoopRunner) {
        let queue = MessageQueue::new(&self.cfg);
        let runner = LoopRunner::new(Arc::clone(&queue), self.subscribers);
        (Looper::from_queue(queue), runner)
    }

    /// Spawns a dedicated thread named after [`LooperConfig::name`] and runs the loop on it.
    pub fn spawn(self) -> Result<Looper, RuntimeError> {
        let name = self.cfg.name.clone();
        let (looper, runner) = self.prepare();

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                if let Err(err) = runner.run() {
                    tracing::error!(label = err.as_label(), error = %err, "looper failed to start");
                }
            })
            .map_err(|source| RuntimeError::Spawn { name, source })?;
        looper.attach_thread(handle);
        Ok(looper)
    }
}
