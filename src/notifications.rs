//! Job lifecycle notifications.
//!
//! The queue and the worker raise a notification before a job runs, after it
//! completes, and when it fails. Notifications are best-effort: when no
//! dispatcher is configured they are skipped, never an error.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::{JobError, JobRecord};

/// The slice of a [`JobRecord`] that travels inside notifications.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSummary {
    pub id: String,
    pub queue: String,
    pub connection: String,
}

impl From<&JobRecord> for JobSummary {
    fn from(record: &JobRecord) -> Self {
        JobSummary {
            id: record.id().to_string(),
            queue: record.queue().to_string(),
            connection: record.connection().to_string(),
        }
    }
}

/// Notification raised around a job's execution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueueNotification {
    JobProcessing {
        connection: String,
        job: JobSummary,
    },
    JobProcessed {
        connection: String,
        job: JobSummary,
    },
    JobExceptionOccurred {
        connection: String,
        job: JobSummary,
        error: String,
    },
}

impl QueueNotification {
    pub fn processing(connection: &str, record: &JobRecord) -> Self {
        QueueNotification::JobProcessing {
            connection: connection.to_string(),
            job: record.into(),
        }
    }

    pub fn processed(connection: &str, record: &JobRecord) -> Self {
        QueueNotification::JobProcessed {
            connection: connection.to_string(),
            job: record.into(),
        }
    }

    pub fn exception_occurred(connection: &str, record: &JobRecord, error: &JobError) -> Self {
        QueueNotification::JobExceptionOccurred {
            connection: connection.to_string(),
            job: record.into(),
            error: error.to_string(),
        }
    }

    /// Event name used when forwarding to an emitter.
    pub fn event_type(&self) -> &'static str {
        match self {
            QueueNotification::JobProcessing { .. } => "queue.job.processing",
            QueueNotification::JobProcessed { .. } => "queue.job.processed",
            QueueNotification::JobExceptionOccurred { .. } => "queue.job.exception",
        }
    }

    pub fn connection(&self) -> &str {
        match self {
            QueueNotification::JobProcessing { connection, .. } => connection,
            QueueNotification::JobProcessed { connection, .. } => connection,
            QueueNotification::JobExceptionOccurred { connection, .. } => connection,
        }
    }

    pub fn job(&self) -> &JobSummary {
        match self {
            QueueNotification::JobProcessing { job, .. } => job,
            QueueNotification::JobProcessed { job, .. } => job,
            QueueNotification::JobExceptionOccurred { job, .. } => job,
        }
    }
}

/// Trait for delivering queue notifications to the host.
///
/// Delivery is fire-and-forget; a dispatcher must not fail the job it is
/// reporting on.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: &QueueNotification);
}

/// A dispatcher that logs notifications, or captures them to a buffer.
pub struct LogDispatcher {
    buffer: Option<Arc<Mutex<Vec<QueueNotification>>>>,
}

impl Default for LogDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl LogDispatcher {
    pub fn new() -> Self {
        LogDispatcher { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<QueueNotification>>>) -> Self {
        LogDispatcher {
            buffer: Some(buffer),
        }
    }
}

impl NotificationDispatcher for LogDispatcher {
    fn dispatch(&self, notification: &QueueNotification) {
        if let Some(buffer) = &self.buffer {
            if let Ok(mut buffer) = buffer.lock() {
                buffer.push(notification.clone());
            }
        } else {
            tracing::debug!(
                event = notification.event_type(),
                job = %notification.job().id,
                queue = %notification.job().queue,
                "queue notification"
            );
        }
    }
}

/// A dispatcher that forwards notifications through an
/// [`EventEmitter`](event_emitter_rs::EventEmitter) for in-process
/// subscribers.
///
/// Listeners receive the notification serialized as a JSON string under the
/// [`QueueNotification::event_type`] event name. The emitter runs listeners
/// on its own thread, which is fine here: notifications carry no ordering
/// guarantee of their own.
#[cfg(feature = "emitter")]
pub struct EmitterDispatcher {
    emitter: Mutex<event_emitter_rs::EventEmitter>,
}

#[cfg(feature = "emitter")]
impl Default for EmitterDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "emitter")]
impl EmitterDispatcher {
    pub fn new() -> Self {
        EmitterDispatcher {
            emitter: Mutex::new(event_emitter_rs::EventEmitter::new()),
        }
    }

    /// Register a listener for one of the `queue.job.*` event names.
    pub fn on<F>(&self, event: &str, listener: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        if let Ok(mut emitter) = self.emitter.lock() {
            emitter.on(event, listener);
        }
    }
}

#[cfg(feature = "emitter")]
impl NotificationDispatcher for EmitterDispatcher {
    fn dispatch(&self, notification: &QueueNotification) {
        let payload = match serde_json::to_string(notification) {
            Ok(payload) => payload,
            Err(_) => return,
        };
        if let Ok(mut emitter) = self.emitter.lock() {
            emitter.emit(notification.event_type(), payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Job;
    use std::error::Error;

    struct Noop;

    impl Job for Noop {
        fn execute(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
            Ok(())
        }
    }

    fn record() -> JobRecord {
        JobRecord::new(Box::new(Noop), Vec::new(), "orders", "transaction-commit")
    }

    #[test]
    fn event_types() {
        let record = record();
        let processing = QueueNotification::processing("transaction-commit", &record);
        let processed = QueueNotification::processed("transaction-commit", &record);
        let failed = QueueNotification::exception_occurred(
            "transaction-commit",
            &record,
            &JobError::fatal(record.id(), "panic"),
        );

        assert_eq!(processing.event_type(), "queue.job.processing");
        assert_eq!(processed.event_type(), "queue.job.processed");
        assert_eq!(failed.event_type(), "queue.job.exception");
        assert_eq!(processing.job().queue, "orders");
    }

    #[test]
    fn log_dispatcher_captures_to_buffer() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = LogDispatcher::with_buffer(buffer.clone());

        let record = record();
        dispatcher.dispatch(&QueueNotification::processing("transaction-commit", &record));
        dispatcher.dispatch(&QueueNotification::processed("transaction-commit", &record));

        let captured = buffer.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].event_type(), "queue.job.processing");
        assert_eq!(captured[1].event_type(), "queue.job.processed");
    }

    #[cfg(feature = "emitter")]
    #[test]
    fn emitter_dispatcher_forwards_json() {
        use std::sync::mpsc;
        use std::time::Duration;

        let dispatcher = EmitterDispatcher::new();
        let (tx, rx) = mpsc::channel();
        dispatcher.on("queue.job.processed", move |payload: String| {
            tx.send(payload).unwrap();
        });

        let record = record();
        dispatcher.dispatch(&QueueNotification::processed("transaction-commit", &record));

        let payload = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("listener never fired");
        let parsed: QueueNotification = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.job().id, record.id());
    }
}
