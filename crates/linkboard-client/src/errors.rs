//! Client error types.

use linkboard_core::{ConnectionId, ConnectionState, EnvelopeError};
use thiserror::Error;

/// Fallback reason when a failed response carries no body.
pub const EMPTY_BODY_REASON: &str = "Network response was not ok";

/// A connect/disconnect request that did not go through.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The server answered with a non-2xx status.
    #[error("server returned {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// The request never completed (connect failure, timeout, ...).
    #[error("request failed: {0}")]
    Transport(String),
}

impl ActionError {
    /// Text shown to the user after `Error: `.
    pub fn reason(&self) -> String {
        match self {
            Self::Http { body, .. } => {
                let body = body.trim();
                if body.is_empty() {
                    EMPTY_BODY_REASON.to_owned()
                } else {
                    body.to_owned()
                }
            }
            Self::Transport(message) => message.clone(),
        }
    }
}

impl From<reqwest::Error> for ActionError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Cross-tab relay failures.
#[derive(Debug, Error)]
pub enum BusError {
    /// The envelope could not be serialized.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The bus rejected the write.
    #[error("message bus unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned through a [`CoordinatorHandle`](crate::CoordinatorHandle).
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Only `Connecting` and `Disconnecting` may be requested.
    #[error("cannot request {desired:?} for {id}; only transitional states may be requested")]
    InvalidTransition {
        /// Target connection.
        id: ConnectionId,
        /// Rejected state.
        desired: ConnectionState,
    },
    /// The coordinator has shut down.
    #[error("coordinator is closed")]
    Closed,
}
