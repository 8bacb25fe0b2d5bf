//! Coordinator event loop, builder, and handle.
//!
//! One task per coordinator owns the [`Coordinator`] and drains a single
//! unbounded queue of [`CoordinatorEvent`]s. Handlers never await, so each
//! event is processed to completion before the next one is looked at. The
//! push and relay pumps, network calls, and timers are separate tasks that
//! only ever talk to the loop through the queue.

use std::sync::Arc;

use linkboard_core::{ConnectionId, ConnectionState, PushFrame, SessionId};
use linkboard_settings::LinkboardSettings;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actions::{
    ActionIntent, ActionOutcome, ActionTransport, HttpActionTransport, SessionEndNotifier,
};
use crate::broadcaster::Broadcaster;
use crate::bus::{self, MessageBus, NullBus};
use crate::coordinator::{Collaborators, Coordinator, ProxyReply, StatusSnapshot, TransitionReply};
use crate::errors::{ActionError, CoordinatorError};
use crate::presenter::{Presenter, TracingPresenter};
use crate::proxy::{ProxyCheck, ProxyChecker};
use crate::push::{self, NullPushSink, PushSink, PushSource};
use crate::session::Session;

/// Everything the event loop reacts to.
#[derive(Debug)]
pub enum CoordinatorEvent {
    /// User asked for a transition.
    Transition {
        /// Target connection.
        id: ConnectionId,
        /// Requested transitional state.
        desired: ConnectionState,
        /// Where to send the outcome.
        reply: TransitionReply,
    },
    /// An action request finished.
    ActionCompleted {
        /// Target connection.
        id: ConnectionId,
        /// Action the response belongs to.
        generation: u64,
        /// What was requested.
        intent: ActionIntent,
        /// Transport result.
        result: Result<(), ActionError>,
        /// Where to send the outcome.
        reply: TransitionReply,
    },
    /// A confirmation timer fired.
    TimerFired {
        /// Target connection.
        id: ConnectionId,
        /// Action the timer belongs to.
        generation: u64,
    },
    /// Inbound push frame.
    Push(PushFrame),
    /// The push channel (re)opened.
    PushOpened,
    /// The push channel dropped.
    PushClosed,
    /// User asked for a proxy check.
    CheckProxy(ProxyReply),
    /// A proxy check finished.
    ProxyChecked {
        /// How it ended.
        check: ProxyCheck,
        /// Where to send it.
        reply: ProxyReply,
    },
    /// Raw envelope from the relay bus.
    Relay(String),
    /// Snapshot request.
    Snapshot(oneshot::Sender<StatusSnapshot>),
    /// Stop the loop and tear down.
    Shutdown,
}

impl CoordinatorEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Transition { .. } => "transition",
            Self::ActionCompleted { .. } => "action_completed",
            Self::TimerFired { .. } => "timer_fired",
            Self::Push(_) => "push",
            Self::PushOpened => "push_opened",
            Self::PushClosed => "push_closed",
            Self::CheckProxy(_) => "check_proxy",
            Self::ProxyChecked { .. } => "proxy_checked",
            Self::Relay(_) => "relay",
            Self::Snapshot(_) => "snapshot",
            Self::Shutdown => "shutdown",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Assembles and starts a coordinator.
///
/// Unset collaborators default to: HTTP transport, session-end notifier, and
/// proxy checker from settings, [`TracingPresenter`], [`NullBus`], no push
/// source, and a discarding push sink.
pub struct CoordinatorBuilder {
    settings: LinkboardSettings,
    session_id: Option<SessionId>,
    presenter: Option<Arc<dyn Presenter>>,
    transport: Option<Arc<dyn ActionTransport>>,
    session_end: Option<Arc<dyn SessionEndNotifier>>,
    proxy_checker: Option<Arc<dyn ProxyChecker>>,
    bus: Option<Arc<dyn MessageBus>>,
    push_source: Option<Box<dyn PushSource>>,
    push_sink: Option<Arc<dyn PushSink>>,
}

impl CoordinatorBuilder {
    /// Start from `settings`.
    pub fn new(settings: LinkboardSettings) -> Self {
        Self {
            settings,
            session_id: None,
            presenter: None,
            transport: None,
            session_end: None,
            proxy_checker: None,
            bus: None,
            push_source: None,
            push_sink: None,
        }
    }

    /// Use a fixed session ID instead of generating one.
    #[must_use]
    pub fn session_id(mut self, id: SessionId) -> Self {
        self.session_id = Some(id);
        self
    }

    /// Render through `presenter`.
    #[must_use]
    pub fn presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Send actions through `transport`.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn ActionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Deliver the teardown notice through `notifier`.
    #[must_use]
    pub fn session_end(mut self, notifier: Arc<dyn SessionEndNotifier>) -> Self {
        self.session_end = Some(notifier);
        self
    }

    /// Run proxy checks through `checker`.
    #[must_use]
    pub fn proxy_checker(mut self, checker: Arc<dyn ProxyChecker>) -> Self {
        self.proxy_checker = Some(checker);
        self
    }

    /// Relay state through `bus`.
    #[must_use]
    pub fn bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Consume push events from `source` and emit through `sink`.
    #[must_use]
    pub fn push(mut self, source: Box<dyn PushSource>, sink: Arc<dyn PushSink>) -> Self {
        self.push_source = Some(source);
        self.push_sink = Some(sink);
        self
    }

    /// Spawn the event loop and pumps. Must be called inside a Tokio runtime.
    pub fn spawn(self) -> CoordinatorHandle {
        let session = self.session_id.map_or_else(Session::new, Session::with_id);
        let session_id = session.id.clone();

        let http = Arc::new(HttpActionTransport::new(
            self.settings.server.clone(),
            self.settings.connections.clone(),
        ));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::clone(&http) as Arc<dyn ActionTransport>);
        let session_end = self
            .session_end
            .unwrap_or_else(|| Arc::clone(&http) as Arc<dyn SessionEndNotifier>);
        let proxy_checker = self
            .proxy_checker
            .unwrap_or_else(|| http as Arc<dyn ProxyChecker>);
        let bus: Arc<dyn MessageBus> = self.bus.unwrap_or_else(|| Arc::new(NullBus));
        let collaborators = Collaborators {
            presenter: self
                .presenter
                .unwrap_or_else(|| Arc::new(TracingPresenter)),
            transport,
            session_end,
            proxy_checker,
            push_sink: self.push_sink.unwrap_or_else(|| Arc::new(NullPushSink)),
            broadcaster: Broadcaster::new(Arc::clone(&bus), session_id.clone()),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let coordinator = Coordinator::new(session, &self.settings, collaborators, tx.clone());

        let mut pumps = Vec::new();
        if let Some(source) = self.push_source {
            pumps.push(tokio::spawn(push::pump(source, tx.clone(), cancel.clone())));
        }
        pumps.push(tokio::spawn(bus::pump(bus.subscribe(), tx.clone(), cancel.clone())));

        let event_loop = tokio::spawn(run(coordinator, rx, cancel.clone()));
        info!(%session_id, "coordinator started");

        CoordinatorHandle {
            events: tx,
            session_id,
            cancel,
            event_loop: Some(event_loop),
            pumps,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event loop
// ─────────────────────────────────────────────────────────────────────────────

async fn run(
    mut coordinator: Coordinator,
    mut rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => event,
        };
        let Some(event) = event else { break };
        debug!(event = event.kind(), "coordinator event");
        match event {
            CoordinatorEvent::Transition { id, desired, reply } => {
                coordinator.begin_transition(id, desired, reply);
            }
            CoordinatorEvent::ActionCompleted {
                id,
                generation,
                intent,
                result,
                reply,
            } => coordinator.finish_request(id, generation, intent, result, reply),
            CoordinatorEvent::TimerFired { id, generation } => coordinator.expire(id, generation),
            CoordinatorEvent::Push(frame) => coordinator.handle_push(&frame),
            CoordinatorEvent::PushOpened => coordinator.handle_push_opened(),
            CoordinatorEvent::PushClosed => coordinator.handle_push_closed(),
            CoordinatorEvent::CheckProxy(reply) => coordinator.begin_proxy_check(reply),
            CoordinatorEvent::ProxyChecked { check, reply } => {
                coordinator.finish_proxy_check(check, reply);
            }
            CoordinatorEvent::Relay(raw) => coordinator.handle_relay(&raw),
            CoordinatorEvent::Snapshot(reply) => {
                let _ = reply.send(coordinator.snapshot());
            }
            CoordinatorEvent::Shutdown => break,
        }
    }
    cancel.cancel();
    coordinator.teardown();
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of a running coordinator. Dropping it stops the coordinator.
pub struct CoordinatorHandle {
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    session_id: SessionId,
    cancel: CancellationToken,
    event_loop: Option<JoinHandle<()>>,
    pumps: Vec<JoinHandle<()>>,
}

impl CoordinatorHandle {
    /// This coordinator's session.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn send(&self, event: CoordinatorEvent) -> Result<(), CoordinatorError> {
        self.events.send(event).map_err(|_| CoordinatorError::Closed)
    }

    /// Request `desired` (`Connecting` or `Disconnecting`) for `id`.
    ///
    /// Resolves once the request's response has been handled; the final
    /// state arrives later through the push channel.
    pub async fn request_transition(
        &self,
        id: ConnectionId,
        desired: ConnectionState,
    ) -> Result<ActionOutcome, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorEvent::Transition { id, desired, reply })?;
        rx.await.map_err(|_| CoordinatorError::Closed)?
    }

    /// Request the opposite of the current settled state of `id`.
    pub async fn toggle(&self, id: ConnectionId) -> Result<ActionOutcome, CoordinatorError> {
        let state = self.snapshot().await?.state(id);
        let desired = state
            .toggle_intent()
            .ok_or(CoordinatorError::InvalidTransition { id, desired: state })?;
        self.request_transition(id, desired).await
    }

    /// Current state.
    pub async fn snapshot(&self) -> Result<StatusSnapshot, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorEvent::Snapshot(reply))?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    /// Ask the server to test its configured proxy.
    ///
    /// The outcome is also shown through the presenter.
    pub async fn check_proxy(&self) -> Result<ProxyCheck, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorEvent::CheckProxy(reply))?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }

    /// Inject a push frame as if it arrived on the push channel.
    pub fn dispatch_push(&self, frame: PushFrame) -> Result<(), CoordinatorError> {
        self.send(CoordinatorEvent::Push(frame))
    }

    /// Inject a raw relay envelope as if it arrived on the bus.
    pub fn deliver_relay(&self, raw: impl Into<String>) -> Result<(), CoordinatorError> {
        self.send(CoordinatorEvent::Relay(raw.into()))
    }

    /// Stop the coordinator: abort timers, fire the session-end notice, and
    /// stop the pumps. Waits for the loop to exit but not for the notice.
    pub async fn shutdown(mut self) {
        let _ = self.send(CoordinatorEvent::Shutdown);
        if let Some(event_loop) = self.event_loop.take() {
            if let Err(e) = event_loop.await {
                warn!(error = %e, "coordinator loop ended abnormally");
            }
        }
        self.cancel.cancel();
        for pump in self.pumps.drain(..) {
            let _ = pump.await;
        }
        info!(session_id = %self.session_id, "coordinator stopped");
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
