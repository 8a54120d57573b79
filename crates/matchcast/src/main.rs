//! # matchcast
//!
//! Server binary: loads layered settings, installs the metrics recorder and
//! serves `/ws`, `/health` and `/metrics` until Ctrl-C.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use matchcast_server::config::ServerConfig;
use matchcast_server::server::MatchcastServer;
use matchcast_server::shutdown::ShutdownOutcome;
use matchcast_settings::MatchcastSettings;

const METRICS_UPKEEP: Duration = Duration::from_secs(5);

/// Real-time match notification server.
#[derive(Parser, Debug)]
#[command(name = "matchcast", about = "Real-time sports notification server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.matchcast/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Map loaded settings plus CLI flags to the server configuration.
fn server_config(settings: &MatchcastSettings, cli: &Cli) -> ServerConfig {
    let server = &settings.server;
    ServerConfig {
        host: cli.host.clone().unwrap_or_else(|| server.host.clone()),
        port: cli.port.unwrap_or(server.port),
        max_connections: server.max_connections,
        heartbeat_interval_ms: server.heartbeat_interval_ms,
        max_message_size: server.max_message_size,
        outbound_queue_capacity: server.outbound_queue_capacity,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load settings early (needed for log level before logging init)
    let settings_path = cli
        .config
        .clone()
        .unwrap_or_else(matchcast_settings::settings_path);
    let settings = matchcast_settings::load_settings_from_path(&settings_path)?;

    logging::init_subscriber(settings.logging.level.as_filter_str(), settings.logging.json);

    let metrics_handle =
        matchcast_server::metrics::install_recorder().context("Failed to install metrics")?;

    let upkeep = matchcast_server::metrics::spawn_upkeep(metrics_handle.clone(), METRICS_UPKEEP);

    let config = server_config(&settings, &cli);
    let server = MatchcastServer::new(config).with_metrics(metrics_handle);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("matchcast listening on ws://{addr}/ws");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    match server.shutdown().graceful_shutdown(vec![handle], None).await {
        ShutdownOutcome::Drained => {}
        ShutdownOutcome::TimedOut { aborted } => {
            tracing::warn!(aborted, "forced shutdown");
        }
    }
    upkeep.abort();
    Ok(())
}
