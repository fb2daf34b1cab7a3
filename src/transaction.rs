//! Transaction manager contracts.
//!
//! The queue never owns transactions; it observes them. Two capabilities are
//! injected rather than looked up globally, so tests can supply fixed values:
//!
//! - [`TransactionMonitor`] answers "how deep is the transaction nesting on
//!   this connection right now" and "which connection is current".
//! - [`TransactionEventHub`] delivers [`TransactionEvent`]s to standing
//!   listeners synchronously, in subscription order, on the notifying thread.
//!
//! [`InMemoryTransactionMonitor`] implements both sides for testing and
//! single-process scenarios.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

/// Read-only view of the host transaction manager.
pub trait TransactionMonitor: Send + Sync {
    /// Current transaction nesting depth for the given connection.
    /// 0 means no active transaction.
    fn transaction_depth(&self, connection: &str) -> usize;

    /// Name of the currently active connection, used as the default queue
    /// name when the caller supplies none.
    fn current_connection(&self) -> String;
}

/// Notification emitted by the transaction manager when a transaction closes.
///
/// `depth` is the nesting depth remaining after the transaction closed; a
/// commit with `depth == 0` means the outermost transaction just completed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionEvent {
    Committed { connection: String, depth: usize },
    RolledBack { connection: String, depth: usize },
}

impl TransactionEvent {
    pub fn connection(&self) -> &str {
        match self {
            TransactionEvent::Committed { connection, .. } => connection,
            TransactionEvent::RolledBack { connection, .. } => connection,
        }
    }
}

/// Handle for a registered listener, used to deregister it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&TransactionEvent) + Send + Sync>;

/// Synchronous listener registry for transaction events.
///
/// Cloning shares the underlying registry, so the transaction manager and
/// the bridge can hold the same hub.
#[derive(Clone)]
pub struct TransactionEventHub {
    listeners: Arc<RwLock<Vec<(ListenerId, Listener)>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for TransactionEventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionEventHub {
    pub fn new() -> Self {
        TransactionEventHub {
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a standing listener. Listeners stay registered until
    /// [`unsubscribe`](Self::unsubscribe) is called with the returned id.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TransactionEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap()
            .push((id, Box::new(listener)));
        id
    }

    /// Deregister a listener. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Deliver an event to every listener, in subscription order.
    pub fn notify(&self, event: &TransactionEvent) {
        let listeners = self.listeners.read().unwrap();
        for (_, listener) in listeners.iter() {
            listener(event);
        }
    }
}

/// In-memory transaction manager for testing and single-process scenarios.
///
/// Tracks per-connection nesting depth and publishes [`TransactionEvent`]s
/// through its hub when transactions close. `commit` and `rollback` on a
/// connection with no open transaction are ignored.
#[derive(Clone)]
pub struct InMemoryTransactionMonitor {
    depths: Arc<Mutex<HashMap<String, usize>>>,
    default_connection: String,
    hub: TransactionEventHub,
}

impl InMemoryTransactionMonitor {
    pub fn new(default_connection: impl Into<String>) -> Self {
        InMemoryTransactionMonitor {
            depths: Arc::new(Mutex::new(HashMap::new())),
            default_connection: default_connection.into(),
            hub: TransactionEventHub::new(),
        }
    }

    /// The hub this monitor publishes transaction events through.
    pub fn hub(&self) -> &TransactionEventHub {
        &self.hub
    }

    /// Open a (possibly nested) transaction.
    pub fn begin(&self, connection: Option<&str>) {
        let name = self.resolve(connection);
        let mut depths = self.depths.lock().unwrap();
        *depths.entry(name).or_insert(0) += 1;
    }

    /// Close the innermost transaction and publish a `Committed` event
    /// carrying the remaining depth.
    pub fn commit(&self, connection: Option<&str>) {
        let name = self.resolve(connection);
        let depth = {
            let mut depths = self.depths.lock().unwrap();
            match depths.get_mut(&name) {
                Some(depth) if *depth > 0 => {
                    *depth -= 1;
                    Some(*depth)
                }
                _ => None,
            }
        };
        // Lock released before listeners run: a listener may read depths.
        if let Some(depth) = depth {
            self.hub.notify(&TransactionEvent::Committed {
                connection: name,
                depth,
            });
        }
    }

    /// Abort the innermost transaction and publish a `RolledBack` event.
    pub fn rollback(&self, connection: Option<&str>) {
        let name = self.resolve(connection);
        let depth = {
            let mut depths = self.depths.lock().unwrap();
            match depths.get_mut(&name) {
                Some(depth) if *depth > 0 => {
                    *depth -= 1;
                    Some(*depth)
                }
                _ => None,
            }
        };
        if let Some(depth) = depth {
            self.hub.notify(&TransactionEvent::RolledBack {
                connection: name,
                depth,
            });
        }
    }

    fn resolve(&self, connection: Option<&str>) -> String {
        connection
            .map(str::to_string)
            .unwrap_or_else(|| self.default_connection.clone())
    }
}

impl TransactionMonitor for InMemoryTransactionMonitor {
    fn transaction_depth(&self, connection: &str) -> usize {
        self.depths
            .lock()
            .unwrap()
            .get(connection)
            .copied()
            .unwrap_or(0)
    }

    fn current_connection(&self) -> String {
        self.default_connection.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_delivers_in_subscription_order() {
        let hub = TransactionEventHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        hub.subscribe(move |_| first.lock().unwrap().push("first"));
        let second = seen.clone();
        hub.subscribe(move |_| second.lock().unwrap().push("second"));

        hub.notify(&TransactionEvent::RolledBack {
            connection: "orders".into(),
            depth: 0,
        });

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = TransactionEventHub::new();
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        let id = hub.subscribe(move |_| *counter.lock().unwrap() += 1);

        let event = TransactionEvent::Committed {
            connection: "orders".into(),
            depth: 0,
        };
        hub.notify(&event);
        assert!(hub.unsubscribe(id));
        hub.notify(&event);

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(!hub.unsubscribe(id));
    }

    #[test]
    fn depth_tracks_nesting() {
        let monitor = InMemoryTransactionMonitor::new("orders");
        assert_eq!(monitor.transaction_depth("orders"), 0);

        monitor.begin(None);
        monitor.begin(None);
        assert_eq!(monitor.transaction_depth("orders"), 2);

        monitor.commit(None);
        assert_eq!(monitor.transaction_depth("orders"), 1);
        monitor.rollback(None);
        assert_eq!(monitor.transaction_depth("orders"), 0);
    }

    #[test]
    fn commit_publishes_remaining_depth() {
        let monitor = InMemoryTransactionMonitor::new("orders");
        let events = Arc::new(Mutex::new(Vec::new()));

        let sink = events.clone();
        monitor.hub().subscribe(move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        monitor.begin(None);
        monitor.begin(None);
        monitor.commit(None);
        monitor.commit(None);

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                TransactionEvent::Committed {
                    connection: "orders".into(),
                    depth: 1
                },
                TransactionEvent::Committed {
                    connection: "orders".into(),
                    depth: 0
                },
            ]
        );
    }

    #[test]
    fn closing_without_open_transaction_is_ignored() {
        let monitor = InMemoryTransactionMonitor::new("orders");
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        monitor.hub().subscribe(move |_| *counter.lock().unwrap() += 1);

        monitor.commit(None);
        monitor.rollback(Some("other"));

        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn connections_are_independent() {
        let monitor = InMemoryTransactionMonitor::new("orders");

        monitor.begin(Some("billing"));
        assert_eq!(monitor.transaction_depth("billing"), 1);
        assert_eq!(monitor.transaction_depth("orders"), 0);
        assert_eq!(monitor.current_connection(), "orders");
    }
}
