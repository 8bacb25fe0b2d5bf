//! The coordinator state machine.
//!
//! [`Coordinator`] owns every piece of mutable per-tab state and is driven
//! exclusively by the event loop in [`runtime`](crate::runtime). Handlers run
//! to completion without awaiting; network calls and timers are spawned and
//! report back through the event queue, tagged with the generation of the
//! action they belong to.

use std::sync::Arc;
use std::time::Duration;

use linkboard_core::payloads::{self, PushEvent};
use linkboard_core::{
    Authority, CombinedStatus, ConnectionId, ConnectionState, Notification, Observed, PartialUpdate,
    PushFrame, SessionId,
};
use linkboard_settings::{ConnectionsSettings, LinkboardSettings};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::actions::{ActionIntent, ActionOutcome, ActionRequest, ActionTransport, SessionEndNotifier};
use crate::broadcaster::Broadcaster;
use crate::errors::{ActionError, CoordinatorError};
use crate::pending::PendingActions;
use crate::presenter::{Presenter, PresenterObserver};
use crate::proxy::{ProxyCheck, ProxyChecker};
use crate::push::PushSink;
use crate::runtime::CoordinatorEvent;
use crate::session::Session;
use crate::store::StatusStore;

/// Warning shown when an action is never confirmed.
pub const NO_RESPONSE_WARNING: &str = "No response from server. Please check your connection.";

/// Notice shown when another session of the same user disconnects.
pub const FOREIGN_DISCONNECT_NOTICE: &str = "A session was disconnected from another device/tab";

/// Warning shown when the push channel drops.
pub const PUSH_LOST_WARNING: &str = "Lost connection to live updates. Reconnecting...";

/// Reply channel for a proxy check.
pub type ProxyReply = oneshot::Sender<ProxyCheck>;

/// Reply channel for a transition request.
pub type TransitionReply = oneshot::Sender<Result<ActionOutcome, CoordinatorError>>;

/// Point-in-time view of a coordinator.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Session of the coordinator.
    pub session_id: SessionId,
    /// Primary connection value.
    pub primary: Observed,
    /// Broker connection value.
    pub broker: Observed,
    /// Derived combined status.
    pub combined: CombinedStatus,
    /// Connections with an action in flight.
    pub pending: Vec<ConnectionId>,
    /// Armed confirmation timers.
    pub armed_timers: usize,
}

impl StatusSnapshot {
    /// Flattened state of `id`.
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        self.observed(id).value()
    }

    /// Provenance-tagged value of `id`.
    pub fn observed(&self, id: ConnectionId) -> Observed {
        match id {
            ConnectionId::Primary => self.primary,
            ConnectionId::Broker => self.broker,
        }
    }
}

/// Collaborators a coordinator talks to.
pub(crate) struct Collaborators {
    pub presenter: Arc<dyn Presenter>,
    pub transport: Arc<dyn ActionTransport>,
    pub session_end: Arc<dyn SessionEndNotifier>,
    pub proxy_checker: Arc<dyn ProxyChecker>,
    pub push_sink: Arc<dyn PushSink>,
    pub broadcaster: Broadcaster,
}

/// Per-tab coordinator state.
pub struct Coordinator {
    session: Session,
    store: StatusStore,
    pending: PendingActions,
    broadcaster: Broadcaster,
    presenter: Arc<dyn Presenter>,
    transport: Arc<dyn ActionTransport>,
    session_end: Arc<dyn SessionEndNotifier>,
    proxy_checker: Arc<dyn ProxyChecker>,
    push_sink: Arc<dyn PushSink>,
    push_lost: bool,
    connections: ConnectionsSettings,
    confirmation_timeout: Duration,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl Coordinator {
    pub(crate) fn new(
        session: Session,
        settings: &LinkboardSettings,
        collaborators: Collaborators,
        events: mpsc::UnboundedSender<CoordinatorEvent>,
    ) -> Self {
        let Collaborators {
            presenter,
            transport,
            session_end,
            proxy_checker,
            push_sink,
            broadcaster,
        } = collaborators;

        let mut store = StatusStore::new();
        store.add_observer(Box::new(PresenterObserver::new(Arc::clone(&presenter))));
        store.add_observer(Box::new(broadcaster.clone()));

        Self {
            session,
            store,
            pending: PendingActions::new(),
            broadcaster,
            presenter,
            transport,
            session_end,
            proxy_checker,
            push_sink,
            push_lost: false,
            connections: settings.connections.clone(),
            confirmation_timeout: settings.actions.confirmation_timeout(),
            events,
        }
    }

    /// This coordinator's session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current state.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            session_id: self.session.id.clone(),
            primary: *self.store.observed(ConnectionId::Primary),
            broker: *self.store.observed(ConnectionId::Broker),
            combined: self.store.combined(),
            pending: self.pending.ids(),
            armed_timers: self.pending.armed_timers(),
        }
    }

    fn label(&self, id: ConnectionId) -> &str {
        &self.connections.get(id).label
    }

    fn notify(&self, notification: Notification) {
        self.presenter.on_notification(notification);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Action initiator
    // ─────────────────────────────────────────────────────────────────────

    /// Start a connect or disconnect.
    ///
    /// Replaces any in-flight action for `id`, shows `desired` immediately,
    /// and spawns exactly one request. The reply is sent once the response
    /// has been handled.
    pub(crate) fn begin_transition(
        &mut self,
        id: ConnectionId,
        desired: ConnectionState,
        reply: TransitionReply,
    ) {
        let Some(intent) = ActionIntent::for_state(desired) else {
            let _ = reply.send(Err(CoordinatorError::InvalidTransition { id, desired }));
            return;
        };

        let current = self.store.get_state(id);
        let superseding = self.pending.get(id).map(|a| a.generation);
        let generation = self.pending.issue(id, desired, current);
        if let Some(prior) = superseding {
            debug!(connection = %id, prior, generation, "superseding in-flight action");
        }
        let _ = self.store.set_state(id, Observed::optimistic(desired));
        info!(connection = %id, %intent, generation, "action issued");

        let request = ActionRequest {
            id,
            intent,
            session_id: self.session.id.clone(),
        };
        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        let _ = tokio::spawn(async move {
            let result = transport.send(&request).await;
            let _ = events.send(CoordinatorEvent::ActionCompleted {
                id,
                generation,
                intent,
                result,
                reply,
            });
        });
    }

    /// Handle the response to action `generation`.
    pub(crate) fn finish_request(
        &mut self,
        id: ConnectionId,
        generation: u64,
        intent: ActionIntent,
        result: Result<(), ActionError>,
        reply: TransitionReply,
    ) {
        if !self.pending.is_current(id, generation) {
            debug!(connection = %id, generation, "ignoring response for replaced action");
            let _ = reply.send(Ok(ActionOutcome::Superseded));
            return;
        }

        let outcome = match result {
            Ok(()) => {
                self.notify(Notification::success(format!(
                    "{} {} request sent",
                    self.label(id),
                    intent.noun()
                )));
                self.arm_timer(id, generation);
                ActionOutcome::Accepted
            }
            Err(e) => {
                let reason = e.reason();
                warn!(connection = %id, generation, error = %e, "action failed");
                self.rollback(id, generation);
                self.notify(Notification::error(format!("Error: {reason}")));
                ActionOutcome::Rejected { reason }
            }
        };
        let _ = reply.send(Ok(outcome));
    }

    fn arm_timer(&mut self, id: ConnectionId, generation: u64) {
        let events = self.events.clone();
        let delay = self.confirmation_timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(CoordinatorEvent::TimerFired { id, generation });
        });
        if self.pending.arm(id, generation, timer.abort_handle()) {
            debug!(connection = %id, generation, timeout_ms = delay.as_millis(), "confirmation timer armed");
        }
    }

    /// Handle a confirmation timer firing.
    pub(crate) fn expire(&mut self, id: ConnectionId, generation: u64) {
        if !self.pending.is_current(id, generation) {
            debug!(connection = %id, generation, "ignoring stale timer");
            return;
        }
        warn!(connection = %id, generation, "action unconfirmed, rolling back");
        self.rollback(id, generation);
        self.notify(Notification::warning(NO_RESPONSE_WARNING));
    }

    fn rollback(&mut self, id: ConnectionId, generation: u64) {
        if let Some(action) = self.pending.take_if(id, generation) {
            debug!(
                connection = %id,
                generation,
                restore = %action.restore,
                elapsed_ms = action.issued_at.elapsed().as_millis(),
                "rolling back"
            );
            let _ = self.store.set_state(id, Observed::rollback(action.restore));
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Authoritative updates
    // ─────────────────────────────────────────────────────────────────────

    /// Apply confirmed states, clearing any in-flight action they settle.
    pub(crate) fn apply_authoritative(&mut self, update: PartialUpdate, source: Authority) {
        for (id, state) in update.iter() {
            if let Some(action) = self.pending.clear(id) {
                debug!(
                    connection = %id,
                    generation = action.generation,
                    ?source,
                    elapsed_ms = action.issued_at.elapsed().as_millis(),
                    "action settled"
                );
            }
            let _ = self.store.set_state(id, Observed::authoritative(state, source));
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Push listener
    // ─────────────────────────────────────────────────────────────────────

    /// Dispatch one inbound push frame.
    pub(crate) fn handle_push(&mut self, frame: &PushFrame) {
        let event = match PushEvent::decode(frame) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(event = %frame.event, "ignoring unknown push event");
                return;
            }
            Err(e) => {
                warn!(event = %frame.event, error = %e, "dropping malformed push payload");
                return;
            }
        };

        let states = event.authoritative_states();
        if !states.is_empty() {
            self.apply_authoritative(states, Authority::Push);
        }

        match event {
            PushEvent::Status(update) => {
                if let Some(balance) = update.balance {
                    self.presenter.on_balance_change(balance);
                }
            }
            PushEvent::Primary(status) => {
                if let Some(message) = status.message {
                    self.notify(Notification::info(format!(
                        "{}: {message}",
                        self.label(ConnectionId::Primary)
                    )));
                }
            }
            PushEvent::Signal(signal) => self.notify(signal.notification()),
            PushEvent::Proxy(proxy) => {
                self.presenter.on_proxy_status(&proxy);
                if let Some(notification) = proxy.notification() {
                    self.notify(notification);
                }
            }
            PushEvent::Session(update) => {
                if update.is_foreign_disconnect(self.session.id.as_str()) {
                    self.notify(Notification::info(FOREIGN_DISCONNECT_NOTICE));
                }
            }
        }
    }

    /// The push channel (re)opened: ask for a fresh status.
    pub(crate) fn handle_push_opened(&mut self) {
        info!(session_id = %self.session.id, "push channel open, requesting status");
        self.push_lost = false;
        self.push_sink
            .emit(PushFrame::new(payloads::REQUEST_STATUS_UPDATE, Value::Null));
    }

    /// The push channel dropped: warn once until it reopens.
    ///
    /// In-flight actions keep their confirmation timers.
    pub(crate) fn handle_push_closed(&mut self) {
        if self.push_lost {
            debug!(session_id = %self.session.id, "push channel still closed");
            return;
        }
        self.push_lost = true;
        warn!(
            session_id = %self.session.id,
            pending = self.pending.len(),
            "push channel lost"
        );
        self.notify(Notification::warning(PUSH_LOST_WARNING));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Proxy check
    // ─────────────────────────────────────────────────────────────────────

    /// Run a proxy check off the loop.
    pub(crate) fn begin_proxy_check(&self, reply: ProxyReply) {
        info!(session_id = %self.session.id, "proxy check requested");
        let checker = Arc::clone(&self.proxy_checker);
        let events = self.events.clone();
        let _ = tokio::spawn(async move {
            let check = checker.check().await.unwrap_or_else(|e| ProxyCheck::Failed {
                reason: e.reason(),
            });
            let _ = events.send(CoordinatorEvent::ProxyChecked { check, reply });
        });
    }

    /// Show a finished proxy check.
    pub(crate) fn finish_proxy_check(&self, check: ProxyCheck, reply: ProxyReply) {
        match &check {
            ProxyCheck::Failed { reason } => warn!(%reason, "proxy check failed"),
            ProxyCheck::NotConfigured => debug!("proxy check skipped, none configured"),
            ProxyCheck::Tested { result, .. } => {
                info!(success = result.success, latency_ms = ?result.latency, "proxy tested");
            }
        }
        if let Some(status) = check.status() {
            self.presenter.on_proxy_status(&status);
        }
        self.notify(check.notification());
        let _ = reply.send(check);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Relay
    // ─────────────────────────────────────────────────────────────────────

    /// Apply an envelope written by a sibling tab.
    pub(crate) fn handle_relay(&mut self, raw: &str) {
        if let Some(update) = self.broadcaster.on_incoming(raw) {
            self.apply_authoritative(update, Authority::Relay);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────────────────

    /// Cancel every timer and send the session-end notice without waiting.
    pub(crate) fn teardown(&mut self) {
        let cancelled = self.pending.cancel_all();
        info!(session_id = %self.session.id, cancelled, "coordinator teardown");
        let notifier = Arc::clone(&self.session_end);
        let session_id = self.session.id.clone();
        let _ = tokio::spawn(async move {
            notifier.session_ended(&session_id).await;
        });
    }
}
