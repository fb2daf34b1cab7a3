use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::{JobError, JobRecord, NotificationDispatcher, QueueNotification};

/// Runs a single job and raises lifecycle notifications around it.
///
/// Both the queue's immediate-dispatch path and the worker's drain path hold
/// one of these; the behavior is shared by composition rather than by each
/// component raising its own events.
///
/// A panic inside the job is caught and wrapped as [`JobError::Fatal`] so the
/// failure path is the same as for an ordinary execution error: raise the
/// exception notification, record the failure on the job, return the error.
#[derive(Clone)]
pub struct JobRunner {
    connection: String,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
}

impl JobRunner {
    pub fn new(connection: impl Into<String>) -> Self {
        JobRunner {
            connection: connection.into(),
            dispatcher: None,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Name of the queue connection this runner reports under.
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Execute one record.
    ///
    /// On failure the error is recorded via [`Job::fail`](crate::Job::fail)
    /// and returned to the caller; the caller decides whether this aborts a
    /// drain loop.
    pub fn run(&self, record: &mut JobRecord) -> Result<(), JobError> {
        self.dispatch(QueueNotification::processing(&self.connection, record));

        match panic::catch_unwind(AssertUnwindSafe(|| record.execute())) {
            Ok(Ok(())) => {
                self.dispatch(QueueNotification::processed(&self.connection, record));
                Ok(())
            }
            Ok(Err(source)) => {
                let error = JobError::execution(record.id(), source);
                self.handle_failure(record, error)
            }
            Err(payload) => {
                let error = JobError::fatal(record.id(), panic_message(payload.as_ref()));
                self.handle_failure(record, error)
            }
        }
    }

    fn handle_failure(&self, record: &mut JobRecord, error: JobError) -> Result<(), JobError> {
        self.dispatch(QueueNotification::exception_occurred(
            &self.connection,
            record,
            &error,
        ));
        record.fail(&error);
        Err(error)
    }

    fn dispatch(&self, notification: QueueNotification) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.dispatch(&notification);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("job panicked")
    }
}
