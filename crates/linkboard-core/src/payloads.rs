//! Push-channel frames and their validated payloads.
//!
//! Every inbound frame is a named event plus a JSON value. [`PushEvent::decode`]
//! validates the whole payload before anything is handed to the coordinator,
//! so a malformed frame is rejected without partial effects.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::{ConnectionId, ConnectionState};
use crate::envelope::PartialUpdate;
use crate::errors::PayloadError;
use crate::notification::{Notification, Severity};

/// Authoritative status of one or both connections.
pub const STATUS_UPDATE: &str = "status_update";
/// Trading signal or trade outcome.
pub const NEW_SIGNAL: &str = "new_signal";
/// Alias some servers use for [`NEW_SIGNAL`].
pub const SIGNAL_EVENT: &str = "signal_event";
/// Primary-only status report.
pub const DERIV_STATUS: &str = "deriv_status";
/// Proxy health report.
pub const PROXY_STATUS_UPDATE: &str = "proxy_status_update";
/// Session lifecycle notice.
pub const SESSION_UPDATE: &str = "session_update";
/// Outbound: ask the server to resend current status.
pub const REQUEST_STATUS_UPDATE: &str = "request_status_update";

/// One named event on the push channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    /// Event name.
    pub event: String,
    /// Raw payload.
    #[serde(default)]
    pub data: Value,
}

impl PushFrame {
    /// Build a frame.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload types
// ─────────────────────────────────────────────────────────────────────────────

/// Validated `status_update`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatusUpdate {
    /// Carried connection states.
    pub states: PartialUpdate,
    /// Account balance, when reported.
    pub balance: Option<f64>,
}

#[derive(Deserialize)]
struct RawStatusUpdate {
    #[serde(default)]
    deriv_status: Option<String>,
    #[serde(default)]
    mqtt_status: Option<String>,
    #[serde(default)]
    balance: Option<f64>,
}

/// Outcome attached to a signal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    /// Whether the trade went through.
    #[serde(default)]
    pub success: bool,
    /// Failure reason.
    #[serde(default)]
    pub error: Option<String>,
}

/// Validated `new_signal`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    /// `"signal"`, `"error"`, or anything else.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Display text.
    #[serde(default)]
    pub message: Option<String>,
    /// Trade outcome.
    #[serde(default)]
    pub trade_result: Option<TradeResult>,
    /// Signal detail, passed through untouched.
    #[serde(default)]
    pub data: Option<Value>,
}

impl SignalEvent {
    /// The notification this signal surfaces.
    pub fn notification(&self) -> Notification {
        let mut message = self.message.clone().unwrap_or_default();
        let error = self.trade_result.as_ref().and_then(|r| r.error.as_deref());
        let severity = match self.kind.as_deref() {
            Some("error") => {
                if let Some(error) = error {
                    message = format!("{message} ({error})");
                }
                Severity::Error
            }
            Some("signal") => {
                if self.trade_result.as_ref().is_some_and(|r| r.success) {
                    Severity::Success
                } else {
                    if let Some(error) = error {
                        message = format!("Trade failed: {error}");
                    }
                    Severity::Error
                }
            }
            _ => Severity::Info,
        };
        Notification::new(message, severity)
    }
}

/// Validated `deriv_status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimaryStatus {
    /// Reported state.
    pub state: ConnectionState,
    /// Optional server message.
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct RawPrimaryStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Validated `proxy_status_update`. Informational only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyStatus {
    /// `"Connected"` or anything else.
    #[serde(default)]
    pub proxy_status: Option<String>,
    /// Proxy address.
    #[serde(default)]
    pub proxy_host: Option<String>,
    /// Proxy kind (`http`, `socks5`, ...).
    #[serde(default)]
    pub proxy_type: Option<String>,
    /// Measured latency in milliseconds.
    #[serde(default)]
    pub proxy_latency: Option<f64>,
    /// Message to surface.
    #[serde(default)]
    pub message: Option<String>,
    /// Whether the proxy check succeeded.
    #[serde(default)]
    pub success: bool,
}

impl ProxyStatus {
    /// Whether the proxy reports itself connected.
    pub fn is_connected(&self) -> bool {
        self.proxy_status.as_deref() == Some("Connected")
    }

    /// Latency formatted to two decimals, or `N/A` when absent or zero.
    pub fn latency_text(&self) -> String {
        match self.proxy_latency {
            Some(ms) if ms != 0.0 && ms.is_finite() => format!("{ms:.2}ms"),
            _ => "N/A".to_owned(),
        }
    }

    /// Notification for the attached message, keyed by `success`.
    pub fn notification(&self) -> Option<Notification> {
        let message = self.message.as_deref().filter(|m| !m.is_empty())?;
        let severity = if self.success {
            Severity::Success
        } else {
            Severity::Error
        };
        Some(Notification::new(message, severity))
    }
}

/// Validated `session_update`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    /// Lifecycle kind, e.g. `"disconnect"`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Session the notice concerns.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl SessionUpdate {
    /// Whether this reports another session going away.
    pub fn is_foreign_disconnect(&self, local: &str) -> bool {
        self.kind.as_deref() == Some("disconnect") && self.session_id.as_deref() != Some(local)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PushEvent
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded inbound push event.
#[derive(Clone, Debug, PartialEq)]
pub enum PushEvent {
    /// `status_update`.
    Status(StatusUpdate),
    /// `new_signal`.
    Signal(SignalEvent),
    /// `deriv_status`.
    Primary(PrimaryStatus),
    /// `proxy_status_update`.
    Proxy(ProxyStatus),
    /// `session_update`.
    Session(SessionUpdate),
}

impl PushEvent {
    /// Decode a frame.
    ///
    /// Returns `Ok(None)` for event names this client does not handle.
    pub fn decode(frame: &PushFrame) -> Result<Option<Self>, PayloadError> {
        let event = frame.event.as_str();
        let decoded = match event {
            STATUS_UPDATE => {
                let raw: RawStatusUpdate = decode_object(event, &frame.data)?;
                if raw.balance.is_some_and(|b| !b.is_finite()) {
                    return Err(PayloadError::NonFiniteBalance);
                }
                let states = PartialUpdate::from_wire_fields(
                    raw.deriv_status.as_deref(),
                    raw.mqtt_status.as_deref(),
                )?;
                Self::Status(StatusUpdate {
                    states,
                    balance: raw.balance,
                })
            }
            NEW_SIGNAL | SIGNAL_EVENT => Self::Signal(decode_object(event, &frame.data)?),
            DERIV_STATUS => {
                let raw: RawPrimaryStatus = decode_object(event, &frame.data)?;
                let connected = raw
                    .status
                    .as_deref()
                    .is_some_and(|s| s.trim().eq_ignore_ascii_case("connected"));
                Self::Primary(PrimaryStatus {
                    state: if connected {
                        ConnectionState::Connected
                    } else {
                        ConnectionState::Disconnected
                    },
                    message: raw.message.filter(|m| !m.is_empty()),
                })
            }
            PROXY_STATUS_UPDATE => Self::Proxy(decode_object(event, &frame.data)?),
            SESSION_UPDATE => Self::Session(decode_object(event, &frame.data)?),
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }

    /// Connection states this event asserts authoritatively.
    pub fn authoritative_states(&self) -> PartialUpdate {
        match self {
            Self::Status(update) => update.states,
            Self::Primary(status) => PartialUpdate::single(ConnectionId::Primary, status.state),
            Self::Signal(_) | Self::Proxy(_) | Self::Session(_) => PartialUpdate::default(),
        }
    }
}

fn decode_object<T: DeserializeOwned>(event: &str, data: &Value) -> Result<T, PayloadError> {
    if !data.is_object() {
        return Err(PayloadError::NotAnObject {
            event: event.to_owned(),
        });
    }
    serde_json::from_value(data.clone()).map_err(|source| PayloadError::Decode {
        event: event.to_owned(),
        source,
    })
}
