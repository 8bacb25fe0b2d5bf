//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LinkboardSettings::default()`]
//! 2. If `~/.linkboard/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `LINKBOARD_*` overrides
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{LinkboardSettings, LogFormat};

/// Resolve the path to the settings file (`~/.linkboard/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".linkboard").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LinkboardSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an out-of-range value is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<LinkboardSettings> {
    load_with(path, |name| std::env::var(name).ok())
}

fn load_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<LinkboardSettings> {
    let defaults = serde_json::to_value(LinkboardSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: LinkboardSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `LINKBOARD_*` overrides read through `env`.
///
/// Invalid values are logged and ignored.
fn apply_overrides(settings: &mut LinkboardSettings, env: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| env(name).filter(|v| !v.is_empty());
    let ranged = |name: &str, min: u64, max: u64| {
        let val = env(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    };

    if let Some(v) = string("LINKBOARD_BASE_URL") {
        settings.server.base_url = v;
    }
    if let Some(v) = string("LINKBOARD_SESSION_END_PATH") {
        settings.server.session_end_path = v;
    }
    if let Some(v) = ranged("LINKBOARD_REQUEST_TIMEOUT_MS", 100, 600_000) {
        settings.server.request_timeout_ms = v;
    }
    if let Some(v) = ranged("LINKBOARD_CONFIRMATION_TIMEOUT_MS", 100, 3_600_000) {
        settings.actions.confirmation_timeout_ms = v;
    }
    if let Some(v) = string("LINKBOARD_CHANNEL_KEY") {
        settings.relay.channel_key = v;
    }
    if let Some(v) = string("LINKBOARD_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("LINKBOARD_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => tracing::warn!(key = "LINKBOARD_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log format name (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.trim().to_ascii_lowercase().as_str() {
        "compact" | "text" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"baseUrl": "a", "requestTimeoutMs": 1}});
        let source = serde_json::json!({"server": {"baseUrl": "b"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["baseUrl"], "b");
        assert_eq!(merged["server"]["requestTimeoutMs"], 1);
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_and_primitive_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3], "a": {"nested": true}}),
            serde_json::json!({"items": [4], "a": 42}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
        assert_eq!(merged["a"], 42);
    }

    #[test]
    fn merge_adds_new_keys() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── load ────────────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_with(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings.server.base_url, "http://127.0.0.1:5000");
    }

    #[test]
    fn load_partial_file_keeps_sibling_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"connections": {"broker": {"label": "Broker"}}, "actions": {"confirmationTimeoutMs": 5000}}"#,
        )
        .unwrap();

        let settings = load_with(&path, no_env).unwrap();
        assert_eq!(settings.connections.broker.label, "Broker");
        assert_eq!(settings.connections.broker.endpoint, "/mqtt");
        assert_eq!(settings.actions.confirmation_timeout_ms, 5000);
        assert_eq!(settings.server.request_timeout_ms, 10_000);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert!(matches!(load_with(&path, no_env), Err(SettingsError::Json(_))));
    }

    #[test]
    fn load_mistyped_field_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"relay": {"capacity": "lots"}}"#).unwrap();
        assert!(matches!(load_with(&path, no_env), Err(SettingsError::Json(_))));
    }

    #[test]
    fn load_out_of_range_value_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"baseUrl": ""}}"#).unwrap();
        assert!(matches!(
            load_with(&path, no_env),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"baseUrl": "http://file:1"}}"#).unwrap();

        let env = env_of(&[
            ("LINKBOARD_BASE_URL", "http://env:2"),
            ("LINKBOARD_CONFIRMATION_TIMEOUT_MS", "1500"),
            ("LINKBOARD_CHANNEL_KEY", "status_relay"),
            ("LINKBOARD_LOG_FORMAT", "JSON"),
        ]);
        let settings = load_with(&path, env).unwrap();
        assert_eq!(settings.server.base_url, "http://env:2");
        assert_eq!(settings.actions.confirmation_timeout_ms, 1500);
        assert_eq!(settings.relay.channel_key, "status_relay");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = LinkboardSettings::default();
        apply_overrides(
            &mut settings,
            env_of(&[
                ("LINKBOARD_REQUEST_TIMEOUT_MS", "0"),
                ("LINKBOARD_CONFIRMATION_TIMEOUT_MS", "soon"),
                ("LINKBOARD_LOG_FORMAT", "xml"),
                ("LINKBOARD_LOG_LEVEL", ""),
            ]),
        );
        assert_eq!(settings.server.request_timeout_ms, 10_000);
        assert_eq!(settings.actions.confirmation_timeout_ms, 30_000);
        assert_eq!(settings.logging.format, LogFormat::Compact);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("100", 100, 200), Some(100));
        assert_eq!(parse_u64_range(" 200 ", 100, 200), Some(200));
        assert_eq!(parse_u64_range("99", 100, 200), None);
        assert_eq!(parse_u64_range("-1", 0, 200), None);
    }

    #[test]
    fn settings_path_under_home() {
        let path = settings_path();
        assert!(path.ends_with(".linkboard/settings.json"));
    }
}
