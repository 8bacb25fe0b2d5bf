//! Cross-tab relay envelope.
//!
//! Sibling tabs share connection state by writing a [`BroadcastEnvelope`]
//! under a well-known key. The wire form is a flat JSON object:
//!
//! ```json
//! { "deriv_status": "Connected", "mqtt_status": "Disconnected",
//!   "sessionId": "tab-k3j9x0a1b", "timestamp": 1718000000000 }
//! ```
//!
//! Either status field may be absent. Only settled states travel.

use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionId, ConnectionState};
use crate::errors::{EnvelopeError, PayloadError};
use crate::ids::SessionId;

// ─────────────────────────────────────────────────────────────────────────────
// PartialUpdate
// ─────────────────────────────────────────────────────────────────────────────

/// Settled states for zero, one, or both connections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartialUpdate {
    /// Primary connection state, if carried.
    pub primary: Option<ConnectionState>,
    /// Broker connection state, if carried.
    pub broker: Option<ConnectionState>,
}

impl PartialUpdate {
    /// An update carrying a single connection.
    pub fn single(id: ConnectionId, state: ConnectionState) -> Self {
        let mut update = Self::default();
        update.set(id, state);
        update
    }

    /// State carried for `id`.
    pub fn get(&self, id: ConnectionId) -> Option<ConnectionState> {
        match id {
            ConnectionId::Primary => self.primary,
            ConnectionId::Broker => self.broker,
        }
    }

    /// Set the state carried for `id`.
    pub fn set(&mut self, id: ConnectionId, state: ConnectionState) {
        match id {
            ConnectionId::Primary => self.primary = Some(state),
            ConnectionId::Broker => self.broker = Some(state),
        }
    }

    /// Whether no connection is carried.
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.broker.is_none()
    }

    /// Carried `(id, state)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, ConnectionState)> + '_ {
        ConnectionId::ALL
            .into_iter()
            .filter_map(|id| self.get(id).map(|state| (id, state)))
    }

    /// Validate raw wire strings for both fields.
    ///
    /// Fails on the first value that is not a settled state; nothing is
    /// returned partially.
    pub fn from_wire_fields(
        deriv_status: Option<&str>,
        mqtt_status: Option<&str>,
    ) -> Result<Self, PayloadError> {
        let parse = |id: ConnectionId, raw: Option<&str>| -> Result<Option<ConnectionState>, PayloadError> {
            raw.map(|value| {
                ConnectionState::from_wire(value).ok_or_else(|| PayloadError::UnknownState {
                    field: id.wire_field(),
                    value: value.to_owned(),
                })
            })
            .transpose()
        };
        Ok(Self {
            primary: parse(ConnectionId::Primary, deriv_status)?,
            broker: parse(ConnectionId::Broker, mqtt_status)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BroadcastEnvelope
// ─────────────────────────────────────────────────────────────────────────────

/// One relay write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastEnvelope {
    /// Carried states.
    pub update: PartialUpdate,
    /// Session of the writing tab.
    pub session_id: SessionId,
    /// Epoch milliseconds at write time.
    pub timestamp: i64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    #[serde(rename = "deriv_status", default, skip_serializing_if = "Option::is_none")]
    deriv_status: Option<String>,
    #[serde(rename = "mqtt_status", default, skip_serializing_if = "Option::is_none")]
    mqtt_status: Option<String>,
    session_id: String,
    #[serde(default)]
    timestamp: i64,
}

impl BroadcastEnvelope {
    /// Stamp `update` with `session_id` and the current time.
    pub fn new(update: PartialUpdate, session_id: SessionId) -> Self {
        Self {
            update,
            session_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Whether this envelope was written by `session_id`.
    pub fn is_from(&self, session_id: &SessionId) -> bool {
        self.session_id == *session_id
    }

    /// Serialize to the wire form. Transitional states are omitted.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        let wire = WireEnvelope {
            deriv_status: self.update.primary.and_then(ConnectionState::as_wire).map(str::to_owned),
            mqtt_status: self.update.broker.and_then(ConnectionState::as_wire).map(str::to_owned),
            session_id: self.session_id.as_str().to_owned(),
            timestamp: self.timestamp,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parse and validate a raw envelope.
    pub fn decode(raw: &str) -> Result<Self, EnvelopeError> {
        let wire: WireEnvelope = serde_json::from_str(raw)?;
        if wire.session_id.trim().is_empty() {
            return Err(EnvelopeError::MissingOrigin);
        }
        let update =
            PartialUpdate::from_wire_fields(wire.deriv_status.as_deref(), wire.mqtt_status.as_deref())?;
        Ok(Self {
            update,
            session_id: SessionId::from(wire.session_id),
            timestamp: wire.timestamp,
        })
    }
}
