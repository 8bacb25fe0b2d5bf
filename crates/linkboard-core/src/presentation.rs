//! Mapping from connection state to what a renderer shows.

use serde::Serialize;

use crate::connection::{CombinedStatus, ConnectionState};

/// Visual tone for badges and cards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Healthy.
    Good,
    /// Degraded or in flight.
    Caution,
    /// Down.
    Bad,
}

/// What the toggle control for one connection should show.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionAffordance {
    /// Status text.
    pub status_label: &'static str,
    /// Button text.
    pub button_label: &'static str,
    /// Whether the control is disabled while a transition is in flight.
    pub busy: bool,
    /// The transitional state pressing the control would request.
    pub next_intent: Option<ConnectionState>,
    /// Card tone.
    pub tone: Tone,
}

impl ConnectionAffordance {
    /// Affordance for `state`.
    pub fn for_state(state: ConnectionState) -> Self {
        let (button_label, tone) = match state {
            ConnectionState::Connected => ("Disconnect", Tone::Good),
            ConnectionState::Disconnected => ("Connect", Tone::Bad),
            ConnectionState::Connecting => ("Connecting...", Tone::Caution),
            ConnectionState::Disconnecting => ("Disconnecting...", Tone::Caution),
        };
        Self {
            status_label: state.label(),
            button_label,
            busy: state.is_transitional(),
            next_intent: state.toggle_intent(),
            tone,
        }
    }
}

/// Badge text and tone for the combined status.
pub fn badge(status: CombinedStatus) -> (&'static str, Tone) {
    let tone = match status {
        CombinedStatus::AllActive => Tone::Good,
        CombinedStatus::Partial => Tone::Caution,
        CombinedStatus::Offline => Tone::Bad,
    };
    (status.label(), tone)
}
