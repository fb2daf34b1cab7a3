//! The transaction-commit queue.
//!
//! Jobs pushed while a transaction is open are buffered in memory, keyed by
//! queue name (defaulting to the current connection's name). Jobs pushed with
//! no transaction open run immediately. Buffers are drained by the
//! [`TransactionCommitWorker`](crate::TransactionCommitWorker) when the
//! transaction manager reports a commit or rollback.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use commit_queue::{InMemoryTransactionMonitor, Job, TransactionCommitQueue};
//!
//! struct SendWelcomeEmail;
//!
//! impl Job for SendWelcomeEmail {
//!     fn execute(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!         // deliver the email
//!         Ok(())
//!     }
//! }
//!
//! let monitor = InMemoryTransactionMonitor::new("default");
//! let queue = TransactionCommitQueue::new(Arc::new(monitor.clone()));
//!
//! // No transaction open: runs immediately.
//! queue.push(SendWelcomeEmail, "user-1", None).unwrap();
//! assert_eq!(queue.size(None), 0);
//!
//! // Inside a transaction: buffered until commit.
//! monitor.begin(None);
//! queue.push(SendWelcomeEmail, "user-2", None).unwrap();
//! assert_eq!(queue.size(None), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::connector::TransactionCommitConnector;
use crate::{
    Job, JobError, JobRecord, JobRunner, NotificationDispatcher, QueueConfig, TransactionMonitor,
};

/// Per-connection in-memory job queue with commit-scoped buffering.
///
/// Cloning shares the underlying buffers, so the queue handle held by the
/// application and the one held by the worker drain the same state. The
/// mutex serializes individual operations; the design still assumes one
/// transaction lifecycle per connection at a time.
#[derive(Clone)]
pub struct TransactionCommitQueue {
    buffers: Arc<Mutex<HashMap<String, VecDeque<JobRecord>>>>,
    monitor: Arc<dyn TransactionMonitor>,
    runner: JobRunner,
    config: QueueConfig,
}

impl TransactionCommitQueue {
    pub fn new(monitor: Arc<dyn TransactionMonitor>) -> Self {
        TransactionCommitQueue {
            buffers: Arc::new(Mutex::new(HashMap::new())),
            monitor,
            runner: JobRunner::new(TransactionCommitConnector::CONNECTION_NAME),
            config: QueueConfig::default(),
        }
    }

    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.runner = self.runner.with_dispatcher(dispatcher);
        self
    }

    /// Name of the queue connection, reported in job notifications.
    pub fn connection_name(&self) -> &str {
        self.runner.connection()
    }

    /// Number of buffered jobs for the resolved queue name. A name never
    /// pushed to counts as zero.
    pub fn size(&self, queue: Option<&str>) -> usize {
        let name = self.resolve_queue(queue);
        let buffers = self.buffers.lock().unwrap();
        buffers.get(&name).map(VecDeque::len).unwrap_or(0)
    }

    /// Push a new job onto the queue.
    ///
    /// When the resolved connection has no open transaction, or the
    /// configuration forces instant dispatch, the job runs synchronously and
    /// any failure propagates to the caller. Otherwise the job is buffered
    /// until the transaction commits. Buffering itself never fails; the
    /// success value is always `true`.
    pub fn push(
        &self,
        job: impl Job + 'static,
        data: impl Into<Vec<u8>>,
        queue: Option<&str>,
    ) -> Result<bool, JobError> {
        let name = self.resolve_queue(queue);
        let record = JobRecord::new(
            Box::new(job),
            data.into(),
            name.as_str(),
            self.runner.connection(),
        );
        self.fire_or_buffer(record, &name)?;
        Ok(true)
    }

    /// Push a new job onto the queue after a delay.
    ///
    /// This backend has no delay scheduling; the delay is accepted but
    /// ignored and the call behaves exactly like [`push`](Self::push).
    pub fn push_later(
        &self,
        _delay: Duration,
        job: impl Job + 'static,
        data: impl Into<Vec<u8>>,
        queue: Option<&str>,
    ) -> Result<bool, JobError> {
        self.push(job, data, queue)
    }

    /// Push a raw payload onto the queue.
    ///
    /// Raw payloads are not supported by this backend; the call is accepted
    /// and discarded without buffering.
    pub fn push_raw(&self, _payload: &[u8], _queue: Option<&str>) {}

    /// Remove and return the next job for the resolved queue name.
    ///
    /// Returns `None` for an absent or empty buffer; never creates one.
    pub fn pop(&self, queue: Option<&str>) -> Option<JobRecord> {
        let name = self.resolve_queue(queue);
        let mut buffers = self.buffers.lock().unwrap();
        buffers.get_mut(&name).and_then(VecDeque::pop_front)
    }

    fn fire_or_buffer(&self, mut record: JobRecord, name: &str) -> Result<(), JobError> {
        if self.monitor.transaction_depth(name) == 0 || self.config.dispatch_instantly() {
            self.runner.run(&mut record)
        } else {
            let mut buffers = self.buffers.lock().unwrap();
            buffers.entry(name.to_string()).or_default().push_back(record);
            Ok(())
        }
    }

    fn resolve_queue(&self, queue: Option<&str>) -> String {
        queue
            .map(str::to_string)
            .unwrap_or_else(|| self.monitor.current_connection())
    }
}
