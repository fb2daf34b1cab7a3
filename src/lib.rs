mod bridge;
mod config;
mod connector;
mod error;
mod job;
mod notifications;
mod queue;
mod runner;
mod transaction;
mod worker;

pub use bridge::{FailureHandler, LogFailureHandler, TransactionEventBridge};
pub use config::QueueConfig;
pub use connector::TransactionCommitConnector;
pub use error::JobError;
pub use job::{encode_payload, Job, JobRecord};
pub use notifications::{JobSummary, LogDispatcher, NotificationDispatcher, QueueNotification};
pub use queue::TransactionCommitQueue;
pub use runner::JobRunner;
pub use transaction::{
    InMemoryTransactionMonitor, ListenerId, TransactionEvent, TransactionEventHub,
    TransactionMonitor,
};
pub use worker::TransactionCommitWorker;

#[cfg(feature = "emitter")]
pub use notifications::EmitterDispatcher;

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
