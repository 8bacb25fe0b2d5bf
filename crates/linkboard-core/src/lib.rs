//! # linkboard-core
//!
//! Shared vocabulary for the linkboard connection-status coordinator.
//!
//! - **Connections**: [`ConnectionId`], [`ConnectionState`], the derived
//!   [`CombinedStatus`], and the provenance-tagged [`Observed`] value
//! - **Session IDs**: per-tab [`SessionId`] newtype
//! - **Push payloads**: validated decoding of every push-channel event
//! - **Relay envelopes**: the cross-tab [`BroadcastEnvelope`] wire format
//! - **Presentation**: affordance and badge mapping for renderers
//! - **Logging**: `tracing` subscriber setup and test capture helpers

#![deny(unsafe_code)]

pub mod connection;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod notification;
pub mod payloads;
pub mod presentation;

pub use connection::{Authority, CombinedStatus, ConnectionId, ConnectionState, LocalCause, Observed};
pub use envelope::{BroadcastEnvelope, PartialUpdate};
pub use errors::{EnvelopeError, PayloadError};
pub use ids::SessionId;
pub use notification::{Notification, Severity};
pub use payloads::{ProxyStatus, PushEvent, PushFrame};
pub use presentation::{ConnectionAffordance, Tone};
