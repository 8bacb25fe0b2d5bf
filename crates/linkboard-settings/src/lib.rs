//! # linkboard-settings
//!
//! Layered configuration for the linkboard coordinator.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`LinkboardSettings::default()`]
//! 2. **User file**: `~/.linkboard/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `LINKBOARD_*` overrides (highest priority)
//!
//! There is no global instance. The binary loads settings once and hands
//! them to the coordinator builder.
//!
//! # Usage
//!
//! ```no_run
//! use linkboard_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("server: {}", settings.server.base_url);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
