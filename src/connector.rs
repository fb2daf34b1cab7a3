use std::sync::Arc;

use crate::{NotificationDispatcher, QueueConfig, TransactionCommitQueue, TransactionMonitor};

/// Establishes the transaction-commit queue connection.
///
/// Collects the collaborators the queue needs (the transaction monitor, an
/// optional notification dispatcher, the configuration) and builds queue
/// instances under the [`CONNECTION_NAME`](Self::CONNECTION_NAME) connection.
pub struct TransactionCommitConnector {
    monitor: Arc<dyn TransactionMonitor>,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
    config: QueueConfig,
}

impl TransactionCommitConnector {
    pub const CONNECTION_NAME: &'static str = "transaction-commit";

    pub fn new(monitor: Arc<dyn TransactionMonitor>) -> Self {
        TransactionCommitConnector {
            monitor,
            dispatcher: None,
            config: QueueConfig::default(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Establish a queue connection.
    pub fn connect(&self) -> TransactionCommitQueue {
        let mut queue =
            TransactionCommitQueue::new(Arc::clone(&self.monitor)).with_config(self.config);
        if let Some(dispatcher) = &self.dispatcher {
            queue = queue.with_dispatcher(Arc::clone(dispatcher));
        }
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryTransactionMonitor, Job, LogDispatcher};
    use std::error::Error;
    use std::sync::Mutex;

    struct Noop;

    impl Job for Noop {
        fn execute(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
            Ok(())
        }
    }

    #[test]
    fn connects_a_queue_under_the_named_connection() {
        let monitor = InMemoryTransactionMonitor::new("orders");
        let connector = TransactionCommitConnector::new(Arc::new(monitor));

        let queue = connector.connect();
        assert_eq!(queue.connection_name(), "transaction-commit");
        assert_eq!(queue.size(None), 0);
    }

    #[test]
    fn connected_queues_carry_the_configured_collaborators() {
        let monitor = InMemoryTransactionMonitor::new("orders");
        let notifications = Arc::new(Mutex::new(Vec::new()));
        let connector = TransactionCommitConnector::new(Arc::new(monitor))
            .with_dispatcher(Arc::new(LogDispatcher::with_buffer(notifications.clone())))
            .with_config(QueueConfig::new().with_dispatch_instantly(true));

        let queue = connector.connect();
        // dispatch_instantly runs the job at push time and notifies.
        queue.push(Noop, "", None).unwrap();

        let captured = notifications.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].connection(), "transaction-commit");
    }
}
