//! Per-tab session identifier.
//!
//! A [`SessionId`] is minted once per coordinator instance and never
//! persisted. It tags outgoing relay envelopes so a tab can recognise its own
//! writes when they echo back.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix shared by every generated session ID.
const SESSION_PREFIX: &str = "tab-";

/// Number of random characters after the prefix.
const SESSION_SUFFIX_LEN: usize = 9;

/// Opaque identifier of one tab's registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh ID of the form `tab-xxxxxxxxx`.
    ///
    /// The suffix is taken from the random tail of a UUID v7.
    #[must_use]
    pub fn new() -> Self {
        let simple = Uuid::now_v7().simple().to_string();
        let suffix = &simple[simple.len() - SESSION_SUFFIX_LEN..];
        Self(format!("{SESSION_PREFIX}{suffix}"))
    }

    /// Wrap an existing value.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_has_tab_prefix_and_fixed_length() {
        let id = SessionId::new();
        assert!(id.as_str().starts_with("tab-"));
        assert_eq!(id.as_str().len(), SESSION_PREFIX.len() + SESSION_SUFFIX_LEN);
        assert!(
            id.as_str()[SESSION_PREFIX.len()..]
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn generated_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..200).map(|_| SessionId::new()).collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn serde_transparent() {
        let id = SessionId::from("tab-abc123def");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"tab-abc123def\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn compares_with_str() {
        let id = SessionId::from("tab-1");
        assert!(id == *"tab-1");
        assert!(id != *"tab-2");
    }
}
