use std::sync::Arc;

use crate::connector::TransactionCommitConnector;
use crate::{JobError, JobRunner, NotificationDispatcher, TransactionCommitQueue};

/// Drains a [`TransactionCommitQueue`] to completion.
///
/// `run` executes every buffered job in FIFO order; `clear` discards them.
/// Both repeatedly pop until the buffer is empty and are no-ops on a queue
/// name that holds nothing.
#[derive(Clone)]
pub struct TransactionCommitWorker {
    queue: TransactionCommitQueue,
    runner: JobRunner,
}

impl TransactionCommitWorker {
    pub fn new(queue: TransactionCommitQueue) -> Self {
        TransactionCommitWorker {
            queue,
            runner: JobRunner::new(TransactionCommitConnector::CONNECTION_NAME),
        }
    }

    /// Raise job lifecycle notifications through the given dispatcher while
    /// draining.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.runner = self.runner.with_dispatcher(dispatcher);
        self
    }

    /// Run buffered jobs until the queue is empty, in the order they were
    /// pushed. Returns the number of jobs executed.
    ///
    /// A job failure propagates immediately and stops the drain; jobs behind
    /// the failed one stay buffered for a future drain call.
    pub fn run(&self, queue: Option<&str>) -> Result<usize, JobError> {
        let mut executed = 0;
        while let Some(mut record) = self.queue.pop(queue) {
            self.runner.run(&mut record)?;
            executed += 1;
        }
        if executed > 0 {
            tracing::debug!(executed, "drained transaction-commit queue");
        }
        Ok(executed)
    }

    /// Discard buffered jobs until the queue is empty, without executing
    /// them and without notifications. Returns the number discarded.
    pub fn clear(&self, queue: Option<&str>) -> usize {
        let mut discarded = 0;
        while self.queue.pop(queue).is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            tracing::debug!(discarded, "cleared transaction-commit queue");
        }
        discarded
    }
}
