//! # linkboard
//!
//! Runs one coordinator session. Push frames are read from stdin as JSON
//! lines, outbound push events are written to stdout, and logs go to stderr.

#![deny(unsafe_code)]

mod stdio;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use linkboard_client::{ActionIntent, CoordinatorBuilder, SharedStore, StorageBus};
use linkboard_core::{ConnectionId, ConnectionState, SessionId};
use linkboard_settings::{LinkboardSettings, LogFormat};
use tokio_util::sync::CancellationToken;

use crate::stdio::{LinesPushSource, WriterPushSink};

/// linkboard connection-status coordinator.
#[derive(Parser, Debug)]
#[command(name = "linkboard", about = "Connection-status coordinator")]
struct Cli {
    /// Settings file (defaults to ~/.linkboard/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Dashboard server base URL (overrides settings).
    #[arg(long)]
    base_url: Option<String>,

    /// Log filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,

    /// Fixed session ID instead of a generated one.
    #[arg(long)]
    session_id: Option<String>,

    /// Transition to request at startup, e.g. `primary:connect`. Repeatable.
    #[arg(long = "request", value_name = "CONNECTION:ACTION")]
    requests: Vec<String>,

    /// Ask the server to test its configured proxy at startup.
    #[arg(long)]
    test_proxy: bool,
}

impl Cli {
    fn apply(&self, settings: &mut LinkboardSettings) {
        if let Some(ref url) = self.base_url {
            settings.server.base_url.clone_from(url);
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.log_json {
            settings.logging.format = LogFormat::Json;
        }
    }
}

/// Parse `connection:action` into a target and its transitional state.
fn parse_request(raw: &str) -> Result<(ConnectionId, ConnectionState)> {
    let (name, action) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("expected CONNECTION:ACTION, got {raw:?}"))?;
    let id = ConnectionId::parse(name).ok_or_else(|| anyhow!("unknown connection {name:?}"))?;
    let intent = ActionIntent::parse(action).ok_or_else(|| anyhow!("unknown action {action:?}"))?;
    Ok((id, intent.transitional_state()))
}

fn init_logging(settings: &LinkboardSettings) {
    match settings.logging.format {
        LogFormat::Compact => linkboard_core::logging::init_subscriber(&settings.logging.level),
        LogFormat::Json => linkboard_core::logging::init_json_subscriber(&settings.logging.level),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match cli.settings {
        Some(ref path) => linkboard_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => linkboard_settings::load_settings().context("Failed to load settings")?,
    };
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    init_logging(&settings);

    let requests = cli
        .requests
        .iter()
        .map(|r| parse_request(r))
        .collect::<Result<Vec<_>>>()?;

    let store = SharedStore::new(settings.relay.capacity);
    let bus = Arc::new(StorageBus::new(store, settings.relay.channel_key.clone()));
    let input_done = CancellationToken::new();
    let source = LinesPushSource::new(tokio::io::stdin(), input_done.clone());

    let mut builder = CoordinatorBuilder::new(settings)
        .bus(bus)
        .push(Box::new(source), Arc::new(WriterPushSink::stdout()));
    if let Some(id) = cli.session_id {
        builder = builder.session_id(SessionId::from(id));
    }
    let handle = builder.spawn();
    tracing::info!(session_id = %handle.session_id(), "linkboard running");

    for (id, desired) in requests {
        match handle.request_transition(id, desired).await {
            Ok(outcome) => tracing::info!(connection = %id, ?outcome, "startup request finished"),
            Err(e) => tracing::warn!(connection = %id, error = %e, "startup request failed"),
        }
    }

    if cli.test_proxy {
        match handle.check_proxy().await {
            Ok(check) => tracing::info!(result = %check.notification().message, "proxy check finished"),
            Err(e) => tracing::warn!(error = %e, "proxy check failed"),
        }
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl-c")?;
            tracing::info!("interrupted");
        }
        () = input_done.cancelled() => tracing::info!("input closed"),
    }

    if let Ok(snapshot) = handle.snapshot().await {
        tracing::info!(
            primary = %snapshot.state(ConnectionId::Primary),
            broker = %snapshot.state(ConnectionId::Broker),
            combined = %snapshot.combined,
            "final status"
        );
    }
    handle.shutdown().await;
    // Give the session-end notice a moment to leave.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    Ok(())
}
