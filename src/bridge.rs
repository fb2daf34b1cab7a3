//! Wiring between the transaction manager and the commit worker.

use std::sync::{Arc, Mutex};

use crate::{
    JobError, ListenerId, TransactionCommitWorker, TransactionEvent, TransactionEventHub,
};

/// The host's unhandled-failure path for jobs that fail during a deferred
/// drain, where the enqueuer is no longer on the call stack.
pub trait FailureHandler: Send + Sync {
    fn report(&self, error: &JobError);
}

/// A failure handler that logs errors, or captures them to a buffer.
pub struct LogFailureHandler {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl Default for LogFailureHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl LogFailureHandler {
    pub fn new() -> Self {
        LogFailureHandler { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogFailureHandler {
            buffer: Some(buffer),
        }
    }
}

impl FailureHandler for LogFailureHandler {
    fn report(&self, error: &JobError) {
        if let Some(buffer) = &self.buffer {
            if let Ok(mut buffer) = buffer.lock() {
                buffer.push(error.to_string());
            }
        } else {
            tracing::error!(job = error.job(), %error, "deferred job failed after commit");
        }
    }
}

/// Standing listeners that connect transaction events to the worker.
///
/// Constructed once at startup and installed on the hub the transaction
/// manager publishes through:
///
/// - a commit that returns the connection to depth 0 drains and runs that
///   connection's buffered jobs;
/// - a commit at depth > 0 (a nested transaction closing) does nothing;
/// - a rollback clears that connection's buffer unconditionally, nested or
///   not; any rollback invalidates the buffered work's premises.
///
/// Drain failures are reported to the [`FailureHandler`], never swallowed.
#[derive(Clone)]
pub struct TransactionEventBridge {
    worker: TransactionCommitWorker,
    failures: Arc<dyn FailureHandler>,
}

impl TransactionEventBridge {
    pub fn new(worker: TransactionCommitWorker, failures: Arc<dyn FailureHandler>) -> Self {
        TransactionEventBridge { worker, failures }
    }

    /// Register the commit and rollback listeners on the hub. The returned
    /// ids deregister them via [`TransactionEventHub::unsubscribe`].
    pub fn install(&self, hub: &TransactionEventHub) -> (ListenerId, ListenerId) {
        let on_commit = {
            let bridge = self.clone();
            hub.subscribe(move |event| {
                if let TransactionEvent::Committed { connection, depth } = event {
                    bridge.transaction_committed(connection, *depth);
                }
            })
        };
        let on_rollback = {
            let bridge = self.clone();
            hub.subscribe(move |event| {
                if let TransactionEvent::RolledBack { connection, .. } = event {
                    bridge.transaction_rolled_back(connection);
                }
            })
        };
        (on_commit, on_rollback)
    }

    /// Handle a commit notification carrying the post-commit depth.
    pub fn transaction_committed(&self, connection: &str, depth: usize) {
        if depth != 0 {
            return;
        }
        if let Err(error) = self.worker.run(Some(connection)) {
            self.failures.report(&error);
        }
    }

    /// Handle a rollback notification.
    pub fn transaction_rolled_back(&self, connection: &str) {
        self.worker.clear(Some(connection));
    }
}
