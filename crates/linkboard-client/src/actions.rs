//! Request/response action channel.
//!
//! A connect or disconnect intent is sent as a single form-encoded `POST`.
//! A 2xx answer only means the server accepted the intent; the resulting
//! state arrives later on the push channel.

use std::fmt;

use async_trait::async_trait;
use linkboard_core::{ConnectionId, ConnectionState, SessionId};
use linkboard_settings::{ConnectionsSettings, ServerSettings};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::ActionError;
use crate::proxy::{ProxyCheck, ProxyConfig, ProxyChecker, ProxyTestResult};

/// What the user asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionIntent {
    /// Bring the connection up.
    Connect,
    /// Take the connection down.
    Disconnect,
}

impl ActionIntent {
    /// Intent behind a requested transitional state.
    pub fn for_state(desired: ConnectionState) -> Option<Self> {
        match desired {
            ConnectionState::Connecting => Some(Self::Connect),
            ConnectionState::Disconnecting => Some(Self::Disconnect),
            ConnectionState::Connected | ConnectionState::Disconnected => None,
        }
    }

    /// Form value for the `action` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }

    /// Noun used in the success notification.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Connect => "connection",
            Self::Disconnect => "disconnection",
        }
    }

    /// Parse `connect` / `disconnect`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "connect" => Some(Self::Connect),
            "disconnect" => Some(Self::Disconnect),
            _ => None,
        }
    }

    /// The transitional state this intent shows while in flight.
    pub fn transitional_state(self) -> ConnectionState {
        match self {
            Self::Connect => ConnectionState::Connecting,
            Self::Disconnect => ConnectionState::Disconnecting,
        }
    }
}

impl fmt::Display for ActionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRequest {
    /// Target connection.
    pub id: ConnectionId,
    /// Connect or disconnect.
    pub intent: ActionIntent,
    /// Session issuing the request.
    pub session_id: SessionId,
}

/// How a [`request_transition`](crate::CoordinatorHandle::request_transition)
/// call ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The server accepted the intent; confirmation timer armed.
    Accepted,
    /// The request failed and the state was rolled back.
    Rejected {
        /// User-facing reason.
        reason: String,
    },
    /// A newer action or an authoritative update overtook this one before
    /// its response arrived; the response was ignored.
    Superseded,
}

/// Sends action requests.
#[async_trait]
pub trait ActionTransport: Send + Sync {
    /// Deliver `request`. `Ok` means the server answered 2xx.
    async fn send(&self, request: &ActionRequest) -> Result<(), ActionError>;
}

/// Receives the teardown notice. Failures are swallowed.
#[async_trait]
pub trait SessionEndNotifier: Send + Sync {
    /// Tell the server `session_id` is going away.
    async fn session_ended(&self, session_id: &SessionId);
}

/// Action transport backed by `reqwest`.
pub struct HttpActionTransport {
    client: reqwest::Client,
    server: ServerSettings,
    connections: ConnectionsSettings,
}

impl HttpActionTransport {
    /// Create a transport for the given server and endpoints.
    pub fn new(server: ServerSettings, connections: ConnectionsSettings) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("linkboard/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            server,
            connections,
        }
    }

    fn endpoint(&self, id: ConnectionId) -> String {
        self.server.url(&self.connections.get(id).endpoint)
    }

    async fn error_for(response: reqwest::Response) -> ActionError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ActionError::Http { status, body }
    }

    async fn json_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ActionError> {
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ActionTransport for HttpActionTransport {
    async fn send(&self, request: &ActionRequest) -> Result<(), ActionError> {
        let url = self.endpoint(request.id);
        debug!(connection = %request.id, intent = %request.intent, %url, "sending action");
        let response = self
            .client
            .post(&url)
            .timeout(self.server.request_timeout())
            .form(&[
                ("action", request.intent.as_str()),
                ("session_id", request.session_id.as_str()),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::error_for(response).await)
    }
}

#[async_trait]
impl ProxyChecker for HttpActionTransport {
    async fn check(&self) -> Result<ProxyCheck, ActionError> {
        let response = self
            .client
            .get(self.server.url(&self.server.proxy_status_path))
            .timeout(self.server.request_timeout())
            .send()
            .await?;
        let config: ProxyConfig = Self::json_body(response).await?;
        if !config.proxy_configured {
            debug!("no proxy configured");
            return Ok(ProxyCheck::NotConfigured);
        }

        let url = self.server.url(&self.server.proxy_test_path);
        debug!(%url, host = ?config.proxy_host, kind = ?config.proxy_type, "testing proxy");
        let response = self
            .client
            .post(&url)
            .timeout(self.server.request_timeout())
            .json(&config)
            .send()
            .await?;
        let result: ProxyTestResult = Self::json_body(response).await?;
        Ok(ProxyCheck::Tested { config, result })
    }
}

#[async_trait]
impl SessionEndNotifier for HttpActionTransport {
    async fn session_ended(&self, session_id: &SessionId) {
        let url = self.server.url(&self.server.session_end_path);
        let result = self
            .client
            .post(&url)
            .timeout(self.server.request_timeout())
            .json(&serde_json::json!({ "sessionId": session_id }))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!(%session_id, "session end delivered");
            }
            Ok(response) => {
                debug!(%session_id, status = response.status().as_u16(), "session end rejected");
            }
            Err(e) => warn!(%session_id, error = %e, "session end not delivered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer) -> HttpActionTransport {
        let settings = ServerSettings {
            base_url: server.uri(),
            ..ServerSettings::default()
        };
        HttpActionTransport::new(settings, ConnectionsSettings::default())
    }

    fn request(id: ConnectionId, intent: ActionIntent) -> ActionRequest {
        ActionRequest {
            id,
            intent,
            session_id: SessionId::from("tab-test00001"),
        }
    }

    #[test]
    fn intent_mapping() {
        assert_eq!(
            ActionIntent::for_state(ConnectionState::Connecting),
            Some(ActionIntent::Connect)
        );
        assert_eq!(
            ActionIntent::for_state(ConnectionState::Disconnecting),
            Some(ActionIntent::Disconnect)
        );
        assert_eq!(ActionIntent::for_state(ConnectionState::Connected), None);
        assert_eq!(ActionIntent::parse("Disconnect"), Some(ActionIntent::Disconnect));
        assert_eq!(ActionIntent::Connect.noun(), "connection");
        assert_eq!(
            ActionIntent::Disconnect.transitional_state(),
            ConnectionState::Disconnecting
        );
    }

    #[tokio::test]
    async fn posts_form_to_connection_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deriv"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("action=connect"))
            .and(body_string_contains("session_id=tab-test00001"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        transport
            .send(&request(ConnectionId::Primary, ActionIntent::Connect))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_2xx_returns_body_as_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mqtt"))
            .respond_with(ResponseTemplate::new(500).set_body_string("broker unreachable"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .send(&request(ConnectionId::Broker, ActionIntent::Disconnect))
            .await
            .unwrap_err();
        assert_matches!(err, ActionError::Http { status: 500, .. });
        assert_eq!(err.reason(), "broker unreachable");
    }

    #[tokio::test]
    async fn empty_error_body_uses_fallback_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .send(&request(ConnectionId::Broker, ActionIntent::Connect))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), crate::errors::EMPTY_BODY_REASON);
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let settings = ServerSettings {
            base_url: "http://127.0.0.1:9".into(),
            request_timeout_ms: 500,
            ..ServerSettings::default()
        };
        let transport = HttpActionTransport::new(settings, ConnectionsSettings::default());
        let err = transport
            .send(&request(ConnectionId::Primary, ActionIntent::Connect))
            .await
            .unwrap_err();
        assert_matches!(err, ActionError::Transport(_));
    }

    #[tokio::test]
    async fn session_end_posts_json_beacon() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/session-end"))
            .and(body_json(serde_json::json!({"sessionId": "tab-test00001"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        transport_for(&server)
            .session_ended(&SessionId::from("tab-test00001"))
            .await;
    }

    #[tokio::test]
    async fn proxy_check_tests_reported_configuration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/proxy-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "proxy_configured": true,
                "proxy_type": "socks5",
                "proxy_host": "10.0.0.2",
                "proxy_port": 1080,
                "proxy_username": "",
                "proxy_password": ""
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/test-proxy"))
            .and(body_json(serde_json::json!({
                "proxy_type": "socks5",
                "proxy_host": "10.0.0.2",
                "proxy_port": 1080,
                "proxy_username": "",
                "proxy_password": ""
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "message": "Proxy connection successful",
                "latency": 87.125
            })))
            .expect(1)
            .mount(&server)
            .await;

        let check = transport_for(&server).check().await.unwrap();
        assert_matches!(
            check,
            ProxyCheck::Tested { ref config, ref result }
                if config.proxy_host.as_deref() == Some("10.0.0.2")
                    && result.success
                    && result.latency == Some(87.125)
        );
    }

    #[tokio::test]
    async fn proxy_check_skips_test_when_unconfigured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/proxy-status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"proxy_configured": false})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/test-proxy"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let check = transport_for(&server).check().await.unwrap();
        assert_eq!(check, ProxyCheck::NotConfigured);
    }

    #[tokio::test]
    async fn proxy_check_surfaces_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/proxy-status"))
            .respond_with(ResponseTemplate::new(500).set_body_string("settings unavailable"))
            .mount(&server)
            .await;

        let err = transport_for(&server).check().await.unwrap_err();
        assert_matches!(err, ActionError::Http { status: 500, .. });
        assert_eq!(err.reason(), "settings unavailable");
    }
}
