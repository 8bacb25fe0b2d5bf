//! Transient user-facing notifications.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Notification severity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Neutral information.
    #[default]
    Info,
    /// A request went through.
    Success,
    /// Something needs attention but nothing failed hard.
    Warning,
    /// A request failed.
    Error,
}

impl Severity {
    /// Parse a severity name; unknown names fold to [`Severity::Info`].
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "warning" => Self::Warning,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message to surface to the user. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Display text.
    pub message: String,
    /// Severity.
    pub severity: Severity,
}

impl Notification {
    /// Create a notification.
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }

    /// Info notification.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Info)
    }

    /// Success notification.
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Success)
    }

    /// Warning notification.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Warning)
    }

    /// Error notification.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_parse_known_names() {
        assert_eq!(Severity::parse_lenient("error"), Severity::Error);
        assert_eq!(Severity::parse_lenient("Success"), Severity::Success);
        assert_eq!(Severity::parse_lenient("WARNING"), Severity::Warning);
        assert_eq!(Severity::parse_lenient("info"), Severity::Info);
    }

    #[test]
    fn lenient_parse_unknown_is_info() {
        assert_eq!(Severity::parse_lenient("critical"), Severity::Info);
        assert_eq!(Severity::parse_lenient(""), Severity::Info);
    }

    #[test]
    fn constructors_set_severity() {
        assert_eq!(Notification::warning("w").severity, Severity::Warning);
        assert_eq!(Notification::error("e").severity, Severity::Error);
        assert_eq!(Notification::success("s").severity, Severity::Success);
        assert_eq!(Notification::info("i").severity, Severity::Info);
    }
}
