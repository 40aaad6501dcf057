//! # wandersafe
//!
//! WanderSafe proximity server binary: loads settings, installs logging
//! and metrics, and runs the HTTP/WebSocket server until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use wandersafe_core::logging::{self, LogFormat};
use wandersafe_proximity::{EngineConfig, HubConfig};
use wandersafe_server::config::ServerConfig;
use wandersafe_server::server::WanderSafeServer;
use wandersafe_settings::{ProximitySettings, WanderSafeSettings};

/// WanderSafe live proximity server.
#[derive(Parser, Debug)]
#[command(name = "wandersafe", about = "WanderSafe live proximity server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.wandersafe/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level filter, e.g. `debug` or `wandersafe_proximity=trace`.
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Layer command-line flags over loaded settings.
    fn apply(&self, settings: &mut WanderSafeSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

/// Hub configuration from the proximity section of the settings.
fn hub_config(p: &ProximitySettings) -> HubConfig {
    HubConfig {
        engine: EngineConfig {
            identity_binding: p.identity_binding,
            strategy: p.strategy,
            validate_ranges: p.validate_ranges,
        },
        command_queue_capacity: p.command_queue_capacity,
    }
}

fn build_server(settings: &WanderSafeSettings, metrics: PrometheusHandle) -> WanderSafeServer {
    WanderSafeServer::new(
        ServerConfig::from(&settings.server),
        hub_config(&settings.proximity),
        metrics,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(wandersafe_settings::settings_path);
    let mut settings = wandersafe_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let metrics = wandersafe_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let server = build_server(&settings, metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        identity_binding = ?settings.proximity.identity_binding,
        strategy = ?settings.proximity.strategy,
        "{} listening on http://{addr}",
        settings.name
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(server.config().shutdown_timeout())
        .await;
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
