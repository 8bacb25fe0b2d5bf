//! Cross-tab relay of authoritative state.
//!
//! Only values confirmed by this tab's push channel are published. Relayed,
//! optimistic and rolled-back values stay local so two tabs never bounce the
//! same update back and forth.

use std::sync::Arc;

use linkboard_core::{Authority, BroadcastEnvelope, Observed, PartialUpdate, SessionId};
use tracing::{debug, warn};

use crate::bus::MessageBus;
use crate::errors::BusError;
use crate::store::{StateChange, StoreObserver};

/// Publishes and filters relay envelopes for one session.
#[derive(Clone)]
pub struct Broadcaster {
    bus: Arc<dyn MessageBus>,
    session_id: SessionId,
}

impl Broadcaster {
    /// Broadcaster stamping envelopes with `session_id`.
    pub fn new(bus: Arc<dyn MessageBus>, session_id: SessionId) -> Self {
        Self { bus, session_id }
    }

    /// Publish `update` stamped with this session and the current time.
    pub fn broadcast(&self, update: PartialUpdate) -> Result<(), BusError> {
        let envelope = BroadcastEnvelope::new(update, self.session_id.clone());
        let raw = envelope.encode()?;
        self.bus.publish(raw)?;
        debug!(session_id = %self.session_id, ?update, "relayed status");
        Ok(())
    }

    /// Validate an incoming envelope.
    ///
    /// Returns the carried update, or `None` when the envelope is malformed
    /// (logged at warn) or was written by this session (logged at debug).
    pub fn on_incoming(&self, raw: &str) -> Option<PartialUpdate> {
        let envelope = match BroadcastEnvelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping relay envelope");
                return None;
            }
        };
        if envelope.is_from(&self.session_id) {
            debug!(session_id = %self.session_id, "ignoring own relay envelope");
            return None;
        }
        Some(envelope.update)
    }
}

impl StoreObserver for Broadcaster {
    fn on_state_change(&self, change: &StateChange) {
        let Observed::Authoritative {
            value,
            source: Authority::Push,
        } = change.current
        else {
            return;
        };
        if let Err(e) = self.broadcast(PartialUpdate::single(change.id, value)) {
            warn!(connection = %change.id, error = %e, "failed to relay status");
        }
    }
}
