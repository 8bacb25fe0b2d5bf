//! Presentation adapter seam.
//!
//! Rendering is external. The coordinator reports every visible change to a
//! [`Presenter`]; [`TracingPresenter`] renders through `tracing` for headless
//! use.

use std::sync::Arc;

use linkboard_core::presentation::{ConnectionAffordance, badge};
use linkboard_core::{CombinedStatus, ConnectionId, ConnectionState, Notification, ProxyStatus, Severity};
use tracing::{info, warn};

use crate::store::{StateChange, StoreObserver};

/// Receives everything a user would see.
pub trait Presenter: Send + Sync {
    /// The combined badge changed.
    fn on_combined_status_change(&self, status: CombinedStatus);

    /// One connection's state changed.
    fn on_connection_state_change(&self, id: ConnectionId, state: ConnectionState);

    /// A transient notification.
    fn on_notification(&self, notification: Notification);

    /// A balance arrived with a status update.
    fn on_balance_change(&self, _balance: f64) {}

    /// A proxy health report arrived.
    fn on_proxy_status(&self, _status: &ProxyStatus) {}
}

/// Presenter that logs through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn on_combined_status_change(&self, status: CombinedStatus) {
        let (label, tone) = badge(status);
        info!(status = label, ?tone, "combined status");
    }

    fn on_connection_state_change(&self, id: ConnectionId, state: ConnectionState) {
        let affordance = ConnectionAffordance::for_state(state);
        info!(
            connection = %id,
            state = affordance.status_label,
            button = affordance.button_label,
            busy = affordance.busy,
            "connection state"
        );
    }

    fn on_notification(&self, notification: Notification) {
        match notification.severity {
            Severity::Warning | Severity::Error => {
                warn!(severity = %notification.severity, "{}", notification.message);
            }
            Severity::Info | Severity::Success => {
                info!(severity = %notification.severity, "{}", notification.message);
            }
        }
    }

    fn on_balance_change(&self, balance: f64) {
        info!(balance, "balance");
    }

    fn on_proxy_status(&self, status: &ProxyStatus) {
        info!(
            connected = status.is_connected(),
            host = status.proxy_host.as_deref().unwrap_or("-"),
            kind = status.proxy_type.as_deref().unwrap_or("-"),
            latency = %status.latency_text(),
            "proxy status"
        );
    }
}

/// Bridges store changes to a [`Presenter`].
pub struct PresenterObserver {
    presenter: Arc<dyn Presenter>,
}

impl PresenterObserver {
    /// Observer forwarding to `presenter`.
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self { presenter }
    }
}

impl StoreObserver for PresenterObserver {
    fn on_state_change(&self, change: &StateChange) {
        self.presenter
            .on_connection_state_change(change.id, change.current.value());
        if change.combined_changed() {
            self.presenter.on_combined_status_change(change.combined);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StatusStore;
    use crate::test_utils::{PresenterCall, RecordingPresenter};
    use linkboard_core::logging::capture_logs;
    use linkboard_core::{Authority, Observed};
    use tracing::Level;

    #[test]
    fn observer_reports_state_then_combined() {
        let presenter = Arc::new(RecordingPresenter::new());
        let mut store = StatusStore::new();
        store.add_observer(Box::new(PresenterObserver::new(presenter.clone())));

        let _ = store.set_state(
            ConnectionId::Primary,
            Observed::authoritative(ConnectionState::Connected, Authority::Push),
        );
        assert_eq!(
            presenter.calls(),
            vec![
                PresenterCall::State(ConnectionId::Primary, ConnectionState::Connected),
                PresenterCall::Combined(CombinedStatus::Partial),
            ]
        );
    }

    #[test]
    fn observer_skips_combined_when_unchanged() {
        let presenter = Arc::new(RecordingPresenter::new());
        let mut store = StatusStore::new();
        store.add_observer(Box::new(PresenterObserver::new(presenter.clone())));

        let _ = store.set_state(
            ConnectionId::Broker,
            Observed::optimistic(ConnectionState::Connecting),
        );
        assert_eq!(
            presenter.calls(),
            vec![PresenterCall::State(ConnectionId::Broker, ConnectionState::Connecting)]
        );
    }

    #[test]
    fn tracing_presenter_logs_by_severity() {
        let (logs, _guard) = capture_logs();
        let presenter = TracingPresenter;
        presenter.on_notification(Notification::warning("No response from server"));
        presenter.on_notification(Notification::success("MQTT connection request sent"));
        presenter.on_combined_status_change(CombinedStatus::AllActive);

        assert!(logs.has_event(Level::WARN, "No response from server"));
        assert!(logs.has_event(Level::INFO, "MQTT connection request sent"));
        let combined = logs
            .events()
            .into_iter()
            .find(|e| e.message == "combined status")
            .unwrap();
        assert_eq!(combined.field("status"), Some("ALL ACTIVE"));
    }
}
