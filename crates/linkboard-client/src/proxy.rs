//! On-demand proxy check.
//!
//! The server is asked which proxy it has configured, then asked to test
//! that configuration. The result is shown the same way a pushed
//! `proxy_status_update` is.

use std::fmt;

use async_trait::async_trait;
use linkboard_core::{Notification, ProxyStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ActionError;

/// Warning shown when the server has no proxy configured.
pub const NO_PROXY_WARNING: &str = "No proxy configured";

/// Shown when the proxy test passes.
pub const PROXY_OK_NOTICE: &str = "Proxy test successful!";

/// Proxy configuration as reported by the server.
///
/// Serializes to the body the test endpoint expects; `proxy_configured` is
/// read but never sent back.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Whether a proxy is configured at all.
    #[serde(default, skip_serializing)]
    pub proxy_configured: bool,
    /// Proxy kind (`http`, `socks5`, ...).
    #[serde(default)]
    pub proxy_type: Option<String>,
    /// Proxy host.
    #[serde(default)]
    pub proxy_host: Option<String>,
    /// Proxy port, as a number or a string.
    #[serde(default)]
    pub proxy_port: Option<Value>,
    /// Proxy user.
    #[serde(default)]
    pub proxy_username: Option<String>,
    /// Proxy password.
    #[serde(default)]
    pub proxy_password: Option<String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("proxy_configured", &self.proxy_configured)
            .field("proxy_type", &self.proxy_type)
            .field("proxy_host", &self.proxy_host)
            .field("proxy_port", &self.proxy_port)
            .field("proxy_username", &self.proxy_username)
            .field("proxy_password", &self.proxy_password.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Answer from the test endpoint.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ProxyTestResult {
    /// Whether traffic went through the proxy.
    #[serde(default)]
    pub success: bool,
    /// Server explanation, mostly set on failure.
    #[serde(default)]
    pub message: Option<String>,
    /// Round-trip latency in milliseconds.
    #[serde(default)]
    pub latency: Option<f64>,
}

/// How a proxy check ended.
#[derive(Clone, Debug, PartialEq)]
pub enum ProxyCheck {
    /// The server has no proxy configured; nothing was tested.
    NotConfigured,
    /// The configured proxy was tested.
    Tested {
        /// Configuration that was tested.
        config: ProxyConfig,
        /// Test endpoint answer.
        result: ProxyTestResult,
    },
    /// Either request failed.
    Failed {
        /// User-facing reason.
        reason: String,
    },
}

impl ProxyCheck {
    /// Notification summarising the check.
    pub fn notification(&self) -> Notification {
        match self {
            Self::NotConfigured => Notification::warning(NO_PROXY_WARNING),
            Self::Tested { result, .. } if result.success => Notification::success(PROXY_OK_NOTICE),
            Self::Tested { result, .. } => {
                let message = result
                    .message
                    .as_deref()
                    .filter(|m| !m.is_empty())
                    .unwrap_or("Unknown error");
                Notification::error(format!("Proxy test failed: {message}"))
            }
            Self::Failed { reason } => Notification::error(format!("Error testing proxy: {reason}")),
        }
    }

    /// Status to render, shaped like a pushed proxy update.
    ///
    /// Carries no message; the check's own notification covers that.
    pub fn status(&self) -> Option<ProxyStatus> {
        let Self::Tested { config, result } = self else {
            return None;
        };
        let label = if result.success { "Connected" } else { "Disconnected" };
        Some(ProxyStatus {
            proxy_status: Some(label.to_owned()),
            proxy_host: config.proxy_host.clone(),
            proxy_type: config.proxy_type.clone(),
            proxy_latency: result.latency,
            message: None,
            success: result.success,
        })
    }
}

/// Runs a proxy check against the server.
#[async_trait]
pub trait ProxyChecker: Send + Sync {
    /// Fetch the proxy configuration and, if one is set, test it.
    async fn check(&self) -> Result<ProxyCheck, ActionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkboard_core::Severity;
    use serde_json::json;

    fn tested(success: bool, message: Option<&str>) -> ProxyCheck {
        ProxyCheck::Tested {
            config: ProxyConfig {
                proxy_configured: true,
                proxy_type: Some("socks5".into()),
                proxy_host: Some("10.0.0.2".into()),
                ..ProxyConfig::default()
            },
            result: ProxyTestResult {
                success,
                message: message.map(str::to_owned),
                latency: Some(42.5),
            },
        }
    }

    #[test]
    fn notifications_per_outcome() {
        assert_eq!(
            ProxyCheck::NotConfigured.notification(),
            Notification::warning("No proxy configured")
        );
        assert_eq!(
            tested(true, None).notification(),
            Notification::success("Proxy test successful!")
        );
        assert_eq!(
            tested(false, Some("handshake refused")).notification(),
            Notification::error("Proxy test failed: handshake refused")
        );
        assert_eq!(
            tested(false, Some("")).notification().message,
            "Proxy test failed: Unknown error"
        );
        let failed = ProxyCheck::Failed {
            reason: "connection refused".into(),
        };
        assert_eq!(failed.notification().severity, Severity::Error);
        assert_eq!(
            failed.notification().message,
            "Error testing proxy: connection refused"
        );
    }

    #[test]
    fn status_only_for_tested() {
        assert!(ProxyCheck::NotConfigured.status().is_none());
        let status = tested(true, Some("ok")).status().unwrap();
        assert!(status.is_connected());
        assert_eq!(status.latency_text(), "42.50ms");
        assert_eq!(status.proxy_host.as_deref(), Some("10.0.0.2"));
        assert!(status.notification().is_none());
        assert!(!tested(false, None).status().unwrap().is_connected());
    }

    #[test]
    fn config_round_trips_without_configured_flag() {
        let config: ProxyConfig = serde_json::from_value(json!({
            "proxy_configured": true,
            "proxy_type": "http",
            "proxy_host": "proxy.local",
            "proxy_port": 3128,
            "proxy_username": "u",
            "proxy_password": "p"
        }))
        .unwrap();
        assert!(config.proxy_configured);
        let body = serde_json::to_value(&config).unwrap();
        assert!(body.get("proxy_configured").is_none());
        assert_eq!(body["proxy_port"], 3128);
        assert_eq!(body["proxy_password"], "p");
    }

    #[test]
    fn debug_hides_password() {
        let config = ProxyConfig {
            proxy_password: Some("hunter2".into()),
            ..ProxyConfig::default()
        };
        let text = format!("{config:?}");
        assert!(!text.contains("hunter2"));
        assert!(text.contains("[redacted]"));
    }
}
