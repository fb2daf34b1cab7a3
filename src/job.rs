use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::JobError;

/// An executable unit of work.
///
/// Implementations might include:
/// - Sending an email or webhook after an order is committed
/// - Invalidating a cache entry
/// - Publishing a domain event to an external broker
pub trait Job: Send {
    /// Run the job's work. Runs synchronously on the caller's thread.
    fn execute(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Record terminal failure with the host's job-failure tracking.
    ///
    /// Called exactly once when execution fails, before the error is
    /// propagated to the caller. The default implementation does nothing.
    fn fail(&mut self, _error: &JobError) {}
}

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

fn next_job_id() -> String {
    format!("job-{}", NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
}

/// A job captured at enqueue time, together with its payload and the queue it
/// was pushed onto.
///
/// Records are created by [`TransactionCommitQueue::push`] and consumed
/// exactly once: either run by a [`JobRunner`] or discarded by a rollback
/// drain.
///
/// [`TransactionCommitQueue::push`]: crate::TransactionCommitQueue::push
/// [`JobRunner`]: crate::JobRunner
pub struct JobRecord {
    id: String,
    job: Box<dyn Job>,
    payload: Vec<u8>,
    queue: String,
    connection: String,
}

impl JobRecord {
    pub(crate) fn new(
        job: Box<dyn Job>,
        payload: Vec<u8>,
        queue: impl Into<String>,
        connection: impl Into<String>,
    ) -> Self {
        JobRecord {
            id: next_job_id(),
            job,
            payload,
            queue: queue.into(),
            connection: connection.into(),
        }
    }

    /// Process-unique id assigned at enqueue time.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the queue this record was buffered under.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Name of the queue connection that created this record.
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// The opaque payload bytes supplied at enqueue time.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Decode the payload from bitcode binary format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.payload)
    }

    pub(crate) fn execute(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.job.execute()
    }

    pub(crate) fn fail(&mut self, error: &JobError) {
        self.job.fail(error);
    }
}

impl fmt::Debug for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRecord")
            .field("id", &self.id)
            .field("queue", &self.queue)
            .field("connection", &self.connection)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Encode a typed payload with bitcode for a later [`JobRecord::decode`].
pub fn encode_payload<T: serde::Serialize>(payload: &T) -> Result<Vec<u8>, bitcode::Error> {
    bitcode::serialize(payload)
}
