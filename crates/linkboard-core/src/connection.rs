//! Connection identifiers, states, and the derived combined status.
//!
//! Two external connections are tracked: the trading-API session
//! ([`ConnectionId::Primary`]) and the message-broker session
//! ([`ConnectionId::Broker`]). Each holds an [`Observed`] value that records
//! both the flattened [`ConnectionState`] and which path produced it.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// ConnectionId
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies which external connection a status pertains to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionId {
    /// Trading-API session.
    Primary,
    /// Message-broker session.
    Broker,
}

impl ConnectionId {
    /// Every tracked connection, in display order.
    pub const ALL: [Self; 2] = [Self::Primary, Self::Broker];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Broker => "broker",
        }
    }

    /// Field name carrying this connection's state in push payloads and
    /// relay envelopes.
    pub fn wire_field(self) -> &'static str {
        match self {
            Self::Primary => "deriv_status",
            Self::Broker => "mqtt_status",
        }
    }

    /// Parse the lowercase name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "primary" => Some(Self::Primary),
            "broker" => Some(Self::Broker),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConnectionState
// ─────────────────────────────────────────────────────────────────────────────

/// Live state of one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// Confirmed down.
    Disconnected,
    /// Connect requested, awaiting confirmation.
    Connecting,
    /// Disconnect requested, awaiting confirmation.
    Disconnecting,
    /// Confirmed up.
    Connected,
}

impl ConnectionState {
    /// Whether this is a client-local optimistic state.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }

    /// Parse a settled state from its wire string (`"Connected"` /
    /// `"Disconnected"`, case-insensitive). Transitional states never
    /// appear on the wire.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "connected" => Some(Self::Connected),
            "disconnected" => Some(Self::Disconnected),
            _ => None,
        }
    }

    /// Wire string for settled states; `None` for transitional ones.
    pub fn as_wire(self) -> Option<&'static str> {
        match self {
            Self::Connected => Some("Connected"),
            Self::Disconnected => Some("Disconnected"),
            Self::Connecting | Self::Disconnecting => None,
        }
    }

    /// Human-readable status text.
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Disconnecting => "Disconnecting...",
            Self::Connected => "Connected",
        }
    }

    /// The transitional state a user toggle would request from here.
    ///
    /// Returns `None` while a transition is already in flight.
    pub fn toggle_intent(self) -> Option<Self> {
        match self {
            Self::Connected => Some(Self::Disconnecting),
            Self::Disconnected => Some(Self::Connecting),
            Self::Connecting | Self::Disconnecting => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CombinedStatus
// ─────────────────────────────────────────────────────────────────────────────

/// Two-connection health summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CombinedStatus {
    /// Both connections are up.
    AllActive,
    /// Exactly one connection is up.
    Partial,
    /// Neither connection is up.
    Offline,
}

impl CombinedStatus {
    /// Derive the combined status from the two connection states.
    ///
    /// Only [`ConnectionState::Connected`] counts as up; transitional states
    /// count as down.
    pub fn derive(primary: ConnectionState, broker: ConnectionState) -> Self {
        let up = |s: ConnectionState| s == ConnectionState::Connected;
        match (up(primary), up(broker)) {
            (true, true) => Self::AllActive,
            (true, false) | (false, true) => Self::Partial,
            (false, false) => Self::Offline,
        }
    }

    /// Badge text.
    pub fn label(self) -> &'static str {
        match self {
            Self::AllActive => "ALL ACTIVE",
            Self::Partial => "PARTIAL",
            Self::Offline => "OFFLINE",
        }
    }
}

impl fmt::Display for CombinedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Observed: provenance-tagged state
// ─────────────────────────────────────────────────────────────────────────────

/// Why a client-local value was set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalCause {
    /// Value assumed at startup before any confirmation.
    Initial,
    /// Set immediately on user action, pending confirmation.
    Optimistic,
    /// Restored after a failed or unconfirmed action.
    Rollback,
}

/// Which authoritative path confirmed a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    /// The push channel.
    Push,
    /// A sibling tab, via the cross-tab relay.
    Relay,
}

/// A connection state together with the path that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observed {
    /// Set by this tab without confirmation.
    Local {
        /// The flattened state.
        value: ConnectionState,
        /// Why it was set.
        cause: LocalCause,
    },
    /// Confirmed by the push channel or a sibling tab.
    Authoritative {
        /// The flattened state.
        value: ConnectionState,
        /// Who confirmed it.
        source: Authority,
    },
}

impl Observed {
    /// Startup value for every connection.
    pub const INITIAL: Self = Self::Local {
        value: ConnectionState::Disconnected,
        cause: LocalCause::Initial,
    };

    /// Optimistic local value.
    pub fn optimistic(value: ConnectionState) -> Self {
        Self::Local {
            value,
            cause: LocalCause::Optimistic,
        }
    }

    /// Rolled-back local value.
    pub fn rollback(value: ConnectionState) -> Self {
        Self::Local {
            value,
            cause: LocalCause::Rollback,
        }
    }

    /// Authoritative value.
    pub fn authoritative(value: ConnectionState, source: Authority) -> Self {
        Self::Authoritative { value, source }
    }

    /// The flattened state.
    pub fn value(&self) -> ConnectionState {
        match *self {
            Self::Local { value, .. } | Self::Authoritative { value, .. } => value,
        }
    }

    /// Whether this value was confirmed externally.
    pub fn is_authoritative(&self) -> bool {
        matches!(self, Self::Authoritative { .. })
    }

    /// The authority that confirmed this value, if any.
    pub fn authority(&self) -> Option<Authority> {
        match *self {
            Self::Authoritative { source, .. } => Some(source),
            Self::Local { .. } => None,
        }
    }
}

impl Default for Observed {
    fn default() -> Self {
        Self::INITIAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ConnectionState::{Connected, Connecting, Disconnected, Disconnecting};

    const ALL_STATES: [ConnectionState; 4] = [Disconnected, Connecting, Disconnecting, Connected];

    #[test]
    fn combined_status_is_pure_function_of_inputs() {
        for primary in ALL_STATES {
            for broker in ALL_STATES {
                let expected = match (primary == Connected, broker == Connected) {
                    (true, true) => CombinedStatus::AllActive,
                    (false, false) => CombinedStatus::Offline,
                    _ => CombinedStatus::Partial,
                };
                assert_eq!(
                    CombinedStatus::derive(primary, broker),
                    expected,
                    "primary={primary:?} broker={broker:?}"
                );
            }
        }
    }

    #[test]
    fn transitional_states_count_as_down() {
        assert_eq!(
            CombinedStatus::derive(Connecting, Connected),
            CombinedStatus::Partial
        );
        assert_eq!(
            CombinedStatus::derive(Disconnecting, Disconnecting),
            CombinedStatus::Offline
        );
    }

    #[test]
    fn wire_parsing_accepts_settled_states_only() {
        assert_eq!(ConnectionState::from_wire("Connected"), Some(Connected));
        assert_eq!(ConnectionState::from_wire("disconnected"), Some(Disconnected));
        assert_eq!(ConnectionState::from_wire(" CONNECTED "), Some(Connected));
        assert_eq!(ConnectionState::from_wire("Connecting..."), None);
        assert_eq!(ConnectionState::from_wire(""), None);
    }

    #[test]
    fn as_wire_round_trips_settled_states() {
        for state in [Connected, Disconnected] {
            let wire = state.as_wire().unwrap();
            assert_eq!(ConnectionState::from_wire(wire), Some(state));
        }
        assert!(Connecting.as_wire().is_none());
        assert!(Disconnecting.as_wire().is_none());
    }

    #[test]
    fn toggle_intent() {
        assert_eq!(Connected.toggle_intent(), Some(Disconnecting));
        assert_eq!(Disconnected.toggle_intent(), Some(Connecting));
        assert_eq!(Connecting.toggle_intent(), None);
        assert_eq!(Disconnecting.toggle_intent(), None);
    }

    #[test]
    fn connection_id_wire_fields() {
        assert_eq!(ConnectionId::Primary.wire_field(), "deriv_status");
        assert_eq!(ConnectionId::Broker.wire_field(), "mqtt_status");
    }

    #[test]
    fn connection_id_parse() {
        assert_eq!(ConnectionId::parse("Primary"), Some(ConnectionId::Primary));
        assert_eq!(ConnectionId::parse("broker"), Some(ConnectionId::Broker));
        assert_eq!(ConnectionId::parse("proxy"), None);
    }

    #[test]
    fn observed_flattens_value() {
        let local = Observed::optimistic(Connecting);
        assert_eq!(local.value(), Connecting);
        assert!(!local.is_authoritative());
        assert!(local.authority().is_none());

        let confirmed = Observed::authoritative(Connected, Authority::Push);
        assert_eq!(confirmed.value(), Connected);
        assert!(confirmed.is_authoritative());
        assert_eq!(confirmed.authority(), Some(Authority::Push));
    }

    #[test]
    fn observed_serializes_as_tagged_variant() {
        let json = serde_json::to_value(Observed::authoritative(Connected, Authority::Relay)).unwrap();
        assert_eq!(json["kind"], "authoritative");
        assert_eq!(json["value"], "CONNECTED");
        assert_eq!(json["source"], "relay");

        let json = serde_json::to_value(Observed::INITIAL).unwrap();
        assert_eq!(json["kind"], "local");
        assert_eq!(json["cause"], "initial");
    }

    #[test]
    fn combined_labels() {
        assert_eq!(CombinedStatus::AllActive.to_string(), "ALL ACTIVE");
        assert_eq!(CombinedStatus::Partial.to_string(), "PARTIAL");
        assert_eq!(CombinedStatus::Offline.to_string(), "OFFLINE");
    }
}
