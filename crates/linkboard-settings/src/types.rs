//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every section is `#[serde(default)]`, so
//! a partial file only needs the keys it changes.

use std::time::Duration;

use linkboard_core::ConnectionId;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings.
///
/// ```json
/// {
///   "server": { "baseUrl": "https://dash.example.com" },
///   "connections": { "broker": { "label": "Broker" } }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkboardSettings {
    /// Dashboard server endpoints.
    pub server: ServerSettings,
    /// Action confirmation behaviour.
    pub actions: ActionSettings,
    /// Per-connection labels and endpoints.
    pub connections: ConnectionsSettings,
    /// Cross-tab relay.
    pub relay: RelaySettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl LinkboardSettings {
    /// Reject values the coordinator cannot run with.
    pub fn validate(&self) -> Result<()> {
        let base = self.server.base_url.trim();
        if base.is_empty() {
            return Err(SettingsError::InvalidValue("server.baseUrl is empty".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(SettingsError::InvalidValue(format!(
                "server.baseUrl must be http(s): {base}"
            )));
        }
        for (key, path) in [
            ("sessionEndPath", &self.server.session_end_path),
            ("proxyStatusPath", &self.server.proxy_status_path),
            ("proxyTestPath", &self.server.proxy_test_path),
        ] {
            if !path.starts_with('/') {
                return Err(SettingsError::InvalidValue(format!(
                    "server.{key} must start with '/'"
                )));
            }
        }
        if self.server.request_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.requestTimeoutMs must be positive".into(),
            ));
        }
        if self.actions.confirmation_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "actions.confirmationTimeoutMs must be positive".into(),
            ));
        }
        for id in ConnectionId::ALL {
            if !self.connections.get(id).endpoint.starts_with('/') {
                return Err(SettingsError::InvalidValue(format!(
                    "connections.{id}.endpoint must start with '/'"
                )));
            }
        }
        if self.relay.channel_key.is_empty() {
            return Err(SettingsError::InvalidValue("relay.channelKey is empty".into()));
        }
        if self.relay.capacity == 0 {
            return Err(SettingsError::InvalidValue("relay.capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Dashboard server endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Scheme, host, and port of the dashboard server, without trailing slash.
    pub base_url: String,
    /// Path receiving the teardown beacon.
    pub session_end_path: String,
    /// Path reporting the configured proxy.
    pub proxy_status_path: String,
    /// Path that tests a proxy configuration.
    pub proxy_test_path: String,
    /// Per-request timeout for action and beacon calls.
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Join `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            session_end_path: "/api/session-end".to_string(),
            proxy_status_path: "/api/proxy-status".to_string(),
            proxy_test_path: "/test-proxy".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Action confirmation behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionSettings {
    /// How long a transitional state waits for push confirmation.
    pub confirmation_timeout_ms: u64,
}

impl ActionSettings {
    /// Confirmation window.
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            confirmation_timeout_ms: 30_000,
        }
    }
}

/// One connection's label and action endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Name shown in notifications.
    pub label: String,
    /// Path receiving connect/disconnect requests.
    pub endpoint: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            label: "Connection".to_string(),
            endpoint: "/".to_string(),
        }
    }
}

/// Both connections.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionsSettings {
    /// Trading-API session.
    pub primary: ConnectionSettings,
    /// Message-broker session.
    pub broker: ConnectionSettings,
}

impl ConnectionsSettings {
    /// Settings for `id`.
    pub fn get(&self, id: ConnectionId) -> &ConnectionSettings {
        match id {
            ConnectionId::Primary => &self.primary,
            ConnectionId::Broker => &self.broker,
        }
    }
}

impl Default for ConnectionsSettings {
    fn default() -> Self {
        Self {
            primary: ConnectionSettings {
                label: "Deriv".to_string(),
                endpoint: "/deriv".to_string(),
            },
            broker: ConnectionSettings {
                label: "MQTT".to_string(),
                endpoint: "/mqtt".to_string(),
            },
        }
    }
}

/// Cross-tab relay.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Shared-store key carrying relay envelopes.
    pub channel_key: String,
    /// Buffered change notifications per subscriber.
    pub capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            channel_key: "deriv_status_update".to_string(),
            capacity: 64,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single line.
    #[default]
    Compact,
    /// Newline-delimited JSON.
    Json,
}

/// Log output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
