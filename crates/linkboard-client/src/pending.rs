//! In-flight connect/disconnect actions.
//!
//! At most one [`PendingAction`] exists per connection. Every action gets a
//! fresh generation number; responses and timer expirations carry that
//! number back so reports about a replaced action can be recognised and
//! ignored.

use std::collections::HashMap;

use linkboard_core::{ConnectionId, ConnectionState};
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// One in-flight action.
#[derive(Debug)]
pub struct PendingAction {
    /// Target connection.
    pub id: ConnectionId,
    /// Requested transitional state.
    pub target: ConnectionState,
    /// When the action was issued.
    pub issued_at: Instant,
    /// Identity of this action.
    pub generation: u64,
    /// Settled value to restore if the action fails or goes unconfirmed.
    pub restore: ConnectionState,
    timer: Option<AbortHandle>,
}

impl PendingAction {
    /// Whether a confirmation timer is armed.
    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }
}

impl Drop for PendingAction {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Table of in-flight actions, one slot per connection.
#[derive(Debug, Default)]
pub struct PendingActions {
    slots: HashMap<ConnectionId, PendingAction>,
    next_generation: u64,
}

impl PendingActions {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new action for `id`, replacing any existing one.
    ///
    /// `current` is the store's value at issue time. When an action is
    /// replaced, the new one inherits the old restore value so a rollback
    /// never lands on a transitional state. The replaced action's timer is
    /// aborted. Returns the new generation.
    pub fn issue(&mut self, id: ConnectionId, target: ConnectionState, current: ConnectionState) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        let restore = self.slots.get(&id).map_or(current, |prior| prior.restore);
        let _ = self.slots.insert(
            id,
            PendingAction {
                id,
                target,
                issued_at: Instant::now(),
                generation,
                restore,
                timer: None,
            },
        );
        generation
    }

    /// The action for `id`, if any.
    pub fn get(&self, id: ConnectionId) -> Option<&PendingAction> {
        self.slots.get(&id)
    }

    /// Whether `generation` is still the live action for `id`.
    pub fn is_current(&self, id: ConnectionId, generation: u64) -> bool {
        self.slots.get(&id).is_some_and(|a| a.generation == generation)
    }

    /// Attach a confirmation timer to the live action.
    ///
    /// If `generation` is stale the timer is aborted immediately and `false`
    /// is returned.
    pub fn arm(&mut self, id: ConnectionId, generation: u64, timer: AbortHandle) -> bool {
        match self.slots.get_mut(&id) {
            Some(action) if action.generation == generation => {
                if let Some(old) = action.timer.replace(timer) {
                    old.abort();
                }
                true
            }
            _ => {
                timer.abort();
                false
            }
        }
    }

    /// Remove the action for `id` if it is still `generation`.
    pub fn take_if(&mut self, id: ConnectionId, generation: u64) -> Option<PendingAction> {
        if self.is_current(id, generation) {
            self.slots.remove(&id)
        } else {
            None
        }
    }

    /// Remove whatever action exists for `id`, aborting its timer.
    pub fn clear(&mut self, id: ConnectionId) -> Option<PendingAction> {
        self.slots.remove(&id)
    }

    /// Drop every action and timer. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.slots.len();
        self.slots.clear();
        count
    }

    /// Connections with an action in flight, in display order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        ConnectionId::ALL
            .into_iter()
            .filter(|id| self.slots.contains_key(id))
            .collect()
    }

    /// Number of in-flight actions.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no action is in flight.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of armed confirmation timers.
    pub fn armed_timers(&self) -> usize {
        self.slots.values().filter(|a| a.has_timer()).count()
    }
}
