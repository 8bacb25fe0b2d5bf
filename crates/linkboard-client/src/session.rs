//! One tab's registration.

use chrono::{DateTime, Utc};
use linkboard_core::SessionId;

/// Identity of one coordinator instance. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// Unique per coordinator instance.
    pub id: SessionId,
    /// When the coordinator was built.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session with a generated ID.
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    /// Session with a caller-chosen ID.
    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
