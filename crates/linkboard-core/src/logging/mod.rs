//! `tracing` subscriber setup.
//!
//! - [`init_subscriber`] installs a compact human-readable subscriber on stderr
//! - [`init_json_subscriber`] installs a newline-delimited JSON subscriber on stderr
//! - [`capture_logs`] captures events in memory for tests
//!
//! `RUST_LOG` takes precedence over the level passed in.

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global compact subscriber.
///
/// Call once at startup. Later calls are no-ops.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // no-op if a global default is already set
    let _ = subscriber.try_init();
}

/// Install the global JSON subscriber.
///
/// Same precedence and idempotence as [`init_subscriber`].
pub fn init_json_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .flatten_event(true);

    let _ = subscriber.try_init();
}
