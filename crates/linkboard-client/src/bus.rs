//! Cross-tab message bus.
//!
//! Sibling coordinators share state through a [`MessageBus`]. The storage
//! flavour writes each message under one key of a process-shared
//! [`SharedStore`]; every write raises a change notification to all
//! subscribers, the writer included.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::BusError;
use crate::runtime::CoordinatorEvent;

/// Narrow publish/subscribe interface.
pub trait MessageBus: Send + Sync {
    /// Publish a raw message to every subscriber.
    fn publish(&self, raw: String) -> Result<(), BusError>;

    /// Subscribe to messages published after this call.
    fn subscribe(&self) -> BusSubscription;
}

/// Stream of raw messages from a bus.
pub struct BusSubscription {
    inner: Option<(broadcast::Receiver<StoreChange>, String)>,
}

impl BusSubscription {
    fn keyed(rx: broadcast::Receiver<StoreChange>, key: String) -> Self {
        Self {
            inner: Some((rx, key)),
        }
    }

    /// A subscription that never yields.
    pub fn closed() -> Self {
        Self { inner: None }
    }

    /// Next message, or `None` once the bus is gone.
    ///
    /// Notifications missed because the subscriber fell behind are skipped
    /// with a warning.
    pub async fn recv(&mut self) -> Option<String> {
        let (rx, key) = self.inner.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(change) if change.key == *key => return Some(change.value),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "relay subscriber lagged, messages skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SharedStore
// ─────────────────────────────────────────────────────────────────────────────

/// A write to a [`SharedStore`] key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreChange {
    /// Key written.
    pub key: String,
    /// New value.
    pub value: String,
}

/// Process-shared key-value store with change notifications.
pub struct SharedStore {
    entries: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl SharedStore {
    /// Create a store buffering up to `capacity` notifications per subscriber.
    pub fn new(capacity: usize) -> Arc<Self> {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            changes,
        })
    }

    /// Write `value` under `key` and notify subscribers.
    pub fn set(&self, key: &str, value: String) {
        let _ = self.entries.lock().insert(key.to_owned(), value.clone());
        // No receivers is not an error.
        let _ = self.changes.send(StoreChange {
            key: key.to_owned(),
            value,
        });
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Subscribe to every write.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Implementations
// ─────────────────────────────────────────────────────────────────────────────

/// Bus over one key of a [`SharedStore`].
#[derive(Clone)]
pub struct StorageBus {
    store: Arc<SharedStore>,
    key: String,
}

impl StorageBus {
    /// Bus publishing under `key`.
    pub fn new(store: Arc<SharedStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

impl MessageBus for StorageBus {
    fn publish(&self, raw: String) -> Result<(), BusError> {
        self.store.set(&self.key, raw);
        Ok(())
    }

    fn subscribe(&self) -> BusSubscription {
        BusSubscription::keyed(self.store.subscribe(), self.key.clone())
    }
}

/// Bus for a single tab: publishes nowhere, never delivers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBus;

impl MessageBus for NullBus {
    fn publish(&self, _raw: String) -> Result<(), BusError> {
        Ok(())
    }

    fn subscribe(&self) -> BusSubscription {
        BusSubscription::closed()
    }
}

/// Forward bus messages into the coordinator queue.
pub(crate) async fn pump(
    mut subscription: BusSubscription,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    cancel: CancellationToken,
) {
    loop {
        let raw = tokio::select! {
            () = cancel.cancelled() => break,
            raw = subscription.recv() => raw,
        };
        let Some(raw) = raw else {
            debug!("relay subscription ended");
            break;
        };
        if events.send(CoordinatorEvent::Relay(raw)).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writer_also_receives_its_own_write() {
        let store = SharedStore::new(8);
        let bus = StorageBus::new(Arc::clone(&store), "deriv_status_update");
        let mut own = bus.subscribe();

        bus.publish("{\"a\":1}".into()).unwrap();
        assert_eq!(own.recv().await.as_deref(), Some("{\"a\":1}"));
        assert_eq!(store.get("deriv_status_update").as_deref(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn sibling_buses_share_a_key() {
        let store = SharedStore::new(8);
        let tab_a = StorageBus::new(Arc::clone(&store), "k");
        let tab_b = StorageBus::new(Arc::clone(&store), "k");
        let mut sub_b = tab_b.subscribe();

        tab_a.publish("one".into()).unwrap();
        tab_a.publish("two".into()).unwrap();
        assert_eq!(sub_b.recv().await.as_deref(), Some("one"));
        assert_eq!(sub_b.recv().await.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn other_keys_are_filtered() {
        let store = SharedStore::new(8);
        let bus = StorageBus::new(Arc::clone(&store), "mine");
        let mut sub = bus.subscribe();

        store.set("theirs", "ignored".into());
        store.set("mine", "kept".into());
        assert_eq!(sub.recv().await.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_ahead() {
        let store = SharedStore::new(2);
        let bus = StorageBus::new(Arc::clone(&store), "k");
        let mut sub = bus.subscribe();
        for i in 0..5 {
            bus.publish(i.to_string()).unwrap();
        }
        assert_eq!(sub.recv().await.as_deref(), Some("3"));
        assert_eq!(sub.recv().await.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn null_bus_never_delivers() {
        let bus = NullBus;
        bus.publish("x".into()).unwrap();
        assert!(bus.subscribe().recv().await.is_none());
    }

    #[tokio::test]
    async fn pump_forwards_relay_messages() {
        let store = SharedStore::new(8);
        let bus = StorageBus::new(Arc::clone(&store), "k");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump(bus.subscribe(), tx, cancel.clone()));

        bus.publish("payload".into()).unwrap();
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Relay(r)) if r == "payload"));

        cancel.cancel();
        task.await.unwrap();
    }
}
