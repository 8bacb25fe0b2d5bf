//! In-memory status store.
//!
//! Holds one [`Observed`] value per connection and notifies observers
//! synchronously whenever a flattened [`ConnectionState`] changes.

use linkboard_core::{CombinedStatus, ConnectionId, ConnectionState, Observed};
use tracing::trace;

/// A change in one connection's flattened state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateChange {
    /// Connection that changed.
    pub id: ConnectionId,
    /// Value before the change.
    pub previous: Observed,
    /// Value after the change.
    pub current: Observed,
    /// Combined status before the change.
    pub combined_before: CombinedStatus,
    /// Combined status after the change.
    pub combined: CombinedStatus,
}

impl StateChange {
    /// Whether the combined status moved.
    pub fn combined_changed(&self) -> bool {
        self.combined_before != self.combined
    }
}

/// Receives every [`StateChange`] the store produces.
pub trait StoreObserver: Send + Sync {
    /// Called synchronously after the store has been updated.
    fn on_state_change(&self, change: &StateChange);
}

/// Per-connection state with observer fan-out.
pub struct StatusStore {
    primary: Observed,
    broker: Observed,
    observers: Vec<Box<dyn StoreObserver>>,
}

impl StatusStore {
    /// Store with both connections at [`Observed::INITIAL`].
    pub fn new() -> Self {
        Self {
            primary: Observed::INITIAL,
            broker: Observed::INITIAL,
            observers: Vec::new(),
        }
    }

    /// Register an observer. Observers are notified in registration order.
    pub fn add_observer(&mut self, observer: Box<dyn StoreObserver>) {
        self.observers.push(observer);
    }

    /// Flattened state of `id`.
    pub fn get_state(&self, id: ConnectionId) -> ConnectionState {
        self.observed(id).value()
    }

    /// Full provenance-tagged value of `id`.
    pub fn observed(&self, id: ConnectionId) -> &Observed {
        match id {
            ConnectionId::Primary => &self.primary,
            ConnectionId::Broker => &self.broker,
        }
    }

    /// Combined status of both connections.
    pub fn combined(&self) -> CombinedStatus {
        CombinedStatus::derive(self.primary.value(), self.broker.value())
    }

    /// Record `value` for `id`.
    ///
    /// Returns `None` when the flattened state is unchanged. The new provenance
    /// is still recorded but observers are not notified.
    pub fn set_state(&mut self, id: ConnectionId, value: Observed) -> Option<StateChange> {
        let combined_before = self.combined();
        let slot = match id {
            ConnectionId::Primary => &mut self.primary,
            ConnectionId::Broker => &mut self.broker,
        };
        let previous = std::mem::replace(slot, value);
        if previous.value() == value.value() {
            trace!(connection = %id, state = %value.value(), "state unchanged");
            return None;
        }

        let change = StateChange {
            id,
            previous,
            current: value,
            combined_before,
            combined: self.combined(),
        };
        for observer in &self.observers {
            observer.on_state_change(&change);
        }
        Some(change)
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkboard_core::{Authority, LocalCause};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<StateChange>>>);

    impl StoreObserver for Recorder {
        fn on_state_change(&self, change: &StateChange) {
            self.0.lock().push(*change);
        }
    }

    fn store_with_recorder() -> (StatusStore, Recorder) {
        let mut store = StatusStore::new();
        let recorder = Recorder::default();
        store.add_observer(Box::new(recorder.clone()));
        (store, recorder)
    }

    #[test]
    fn initial_state_is_disconnected_local() {
        let store = StatusStore::new();
        for id in ConnectionId::ALL {
            assert_eq!(store.get_state(id), ConnectionState::Disconnected);
            assert_eq!(
                *store.observed(id),
                Observed::Local {
                    value: ConnectionState::Disconnected,
                    cause: LocalCause::Initial
                }
            );
        }
        assert_eq!(store.combined(), CombinedStatus::Offline);
    }

    #[test]
    fn change_notifies_with_combined_transition() {
        let (mut store, recorder) = store_with_recorder();
        let change = store
            .set_state(
                ConnectionId::Primary,
                Observed::authoritative(ConnectionState::Connected, Authority::Push),
            )
            .unwrap();
        assert_eq!(change.combined_before, CombinedStatus::Offline);
        assert_eq!(change.combined, CombinedStatus::Partial);
        assert!(change.combined_changed());
        assert_eq!(recorder.0.lock().len(), 1);
    }

    #[test]
    fn same_value_is_idempotent_but_records_provenance() {
        let (mut store, recorder) = store_with_recorder();
        let confirmed = Observed::authoritative(ConnectionState::Disconnected, Authority::Relay);
        assert!(store.set_state(ConnectionId::Broker, confirmed).is_none());
        assert_eq!(*store.observed(ConnectionId::Broker), confirmed);
        assert!(recorder.0.lock().is_empty());
    }

    #[test]
    fn transitional_change_keeps_combined() {
        let (mut store, recorder) = store_with_recorder();
        let change = store
            .set_state(
                ConnectionId::Broker,
                Observed::optimistic(ConnectionState::Connecting),
            )
            .unwrap();
        assert!(!change.combined_changed());
        assert_eq!(recorder.0.lock()[0].current.value(), ConnectionState::Connecting);
    }

    #[test]
    fn both_connected_is_all_active() {
        let mut store = StatusStore::new();
        for id in ConnectionId::ALL {
            let _ = store.set_state(
                id,
                Observed::authoritative(ConnectionState::Connected, Authority::Push),
            );
        }
        assert_eq!(store.combined(), CombinedStatus::AllActive);
    }
}
