//! Shared fixtures for tests: a recording presenter and a scripted transport.

use std::collections::VecDeque;

use async_trait::async_trait;
use linkboard_core::{
    CombinedStatus, ConnectionId, ConnectionState, Notification, ProxyStatus, SessionId, Severity,
};
use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};

use crate::actions::{ActionRequest, ActionTransport, SessionEndNotifier};
use crate::errors::ActionError;
use crate::presenter::Presenter;
use crate::proxy::{ProxyCheck, ProxyChecker};

/// One recorded presenter call.
#[derive(Clone, Debug, PartialEq)]
pub enum PresenterCall {
    /// `on_combined_status_change`.
    Combined(CombinedStatus),
    /// `on_connection_state_change`.
    State(ConnectionId, ConnectionState),
    /// `on_notification`.
    Notification(Notification),
    /// `on_balance_change`.
    Balance(f64),
    /// `on_proxy_status`.
    Proxy(ProxyStatus),
}

/// Presenter that records every call in order.
#[derive(Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<PresenterCall>>,
}

impl RecordingPresenter {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<PresenterCall> {
        self.calls.lock().clone()
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Notifications so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PresenterCall::Notification(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    /// Notifications of `severity` so far.
    pub fn notifications_with(&self, severity: Severity) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.severity == severity)
            .collect()
    }

    /// State changes reported for `id`.
    pub fn states_for(&self, id: ConnectionId) -> Vec<ConnectionState> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PresenterCall::State(i, s) if *i == id => Some(*s),
                _ => None,
            })
            .collect()
    }

    /// Combined-status changes reported.
    pub fn combined_changes(&self) -> Vec<CombinedStatus> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PresenterCall::Combined(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    /// Balances reported.
    pub fn balances(&self) -> Vec<f64> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PresenterCall::Balance(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    /// Proxy reports received.
    pub fn proxy_reports(&self) -> Vec<ProxyStatus> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PresenterCall::Proxy(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Presenter for RecordingPresenter {
    fn on_combined_status_change(&self, status: CombinedStatus) {
        self.calls.lock().push(PresenterCall::Combined(status));
    }

    fn on_connection_state_change(&self, id: ConnectionId, state: ConnectionState) {
        self.calls.lock().push(PresenterCall::State(id, state));
    }

    fn on_notification(&self, notification: Notification) {
        self.calls.lock().push(PresenterCall::Notification(notification));
    }

    fn on_balance_change(&self, balance: f64) {
        self.calls.lock().push(PresenterCall::Balance(balance));
    }

    fn on_proxy_status(&self, status: &ProxyStatus) {
        self.calls.lock().push(PresenterCall::Proxy(status.clone()));
    }
}

enum Scripted {
    Ready(Result<(), ActionError>),
    Held(oneshot::Receiver<Result<(), ActionError>>),
}

/// Completes a held response.
pub struct HeldResponse(oneshot::Sender<Result<(), ActionError>>);

impl HeldResponse {
    /// Let the held request finish with `result`.
    pub fn complete(self, result: Result<(), ActionError>) {
        let _ = self.0.send(result);
    }
}

/// Transport answering from a script; unscripted requests succeed.
///
/// Also records session-end notices and answers proxy checks, reporting
/// [`ProxyCheck::NotConfigured`] when nothing is scripted.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ActionRequest>>,
    ended: Mutex<Vec<SessionId>>,
    ended_signal: Notify,
    proxy: Mutex<VecDeque<Result<ProxyCheck, ActionError>>>,
    proxy_checks: Mutex<usize>,
}

impl ScriptedTransport {
    /// Transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next unanswered request with `result`.
    pub fn respond(&self, result: Result<(), ActionError>) {
        self.script.lock().push_back(Scripted::Ready(result));
    }

    /// Hold the next unanswered request until the returned handle completes.
    pub fn hold(&self) -> HeldResponse {
        let (tx, rx) = oneshot::channel();
        self.script.lock().push_back(Scripted::Held(rx));
        HeldResponse(tx)
    }

    /// Answer the next proxy check with `result`.
    pub fn respond_proxy(&self, result: Result<ProxyCheck, ActionError>) {
        self.proxy.lock().push_back(result);
    }

    /// Proxy checks run so far.
    pub fn proxy_checks(&self) -> usize {
        *self.proxy_checks.lock()
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ActionRequest> {
        self.requests.lock().clone()
    }

    /// Sessions reported ended so far.
    pub fn ended_sessions(&self) -> Vec<SessionId> {
        self.ended.lock().clone()
    }

    /// Wait until a session-end notice arrives.
    pub async fn wait_for_session_end(&self) {
        if !self.ended.lock().is_empty() {
            return;
        }
        self.ended_signal.notified().await;
    }
}

#[async_trait]
impl ActionTransport for ScriptedTransport {
    async fn send(&self, request: &ActionRequest) -> Result<(), ActionError> {
        self.requests.lock().push(request.clone());
        let next = self.script.lock().pop_front();
        match next {
            None => Ok(()),
            Some(Scripted::Ready(result)) => result,
            Some(Scripted::Held(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(ActionError::Transport("held response dropped".into()))),
        }
    }
}

#[async_trait]
impl SessionEndNotifier for ScriptedTransport {
    async fn session_ended(&self, session_id: &SessionId) {
        self.ended.lock().push(session_id.clone());
        self.ended_signal.notify_one();
    }
}

#[async_trait]
impl ProxyChecker for ScriptedTransport {
    async fn check(&self) -> Result<ProxyCheck, ActionError> {
        *self.proxy_checks.lock() += 1;
        let next = self.proxy.lock().pop_front();
        next.unwrap_or(Ok(ProxyCheck::NotConfigured))
    }
}
