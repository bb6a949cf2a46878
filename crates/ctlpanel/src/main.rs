//! # ctlpanel
//!
//! Control panel server binary: loads settings, starts the WebSocket
//! listener and health endpoint, and shuts down on ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ctlpanel_core::CommandTable;
use ctlpanel_core::logging::init_subscriber;
use ctlpanel_server::{PanelServer, ServerConfig};
use ctlpanel_settings::{PanelSettings, load_settings_from_path, settings_path};
use tracing::{info, warn};

/// Control panel server.
#[derive(Parser, Debug)]
#[command(name = "ctlpanel", about = "WebSocket control panel server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// WebSocket port (overrides settings, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Number of session slots (overrides settings).
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Health endpoint port (overrides settings).
    #[arg(long)]
    health_port: Option<u16>,

    /// Disable the health endpoint.
    #[arg(long)]
    no_health: bool,

    /// Log filter, e.g. `debug` or `ctlpanel_server=trace` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Settings file (default `~/.ctlpanel/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    /// Apply flags on top of loaded settings.
    fn apply(&self, settings: &mut PanelSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(max) = self.max_sessions {
            settings.server.max_sessions = max;
        }
        if let Some(port) = self.health_port {
            settings.server.health_port = port;
        }
        if self.no_health {
            settings.server.health_enabled = false;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let path = args.settings.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    args.apply(&mut settings);
    settings.validate().context("Invalid settings")?;

    init_subscriber(&settings.logging.level, settings.logging.format);

    let metrics = match ctlpanel_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "metrics recorder unavailable, /metrics will be empty");
            None
        }
    };

    let audio = ctlpanel::build_audio_device(&settings.audio)?;
    let commands = CommandTable::with_defaults();
    info!(commands = ?commands.ids(), "command table ready");

    let config = ServerConfig::from_settings(&settings.server);
    let server = PanelServer::new(config, commands, audio, metrics);
    let addrs = server.start().await.context("Failed to start server")?;
    info!(
        "ctlpanel listening on ws://{} ({} session slots)",
        addrs.ws, settings.server.max_sessions
    );
    if let Some(health) = addrs.health {
        info!("health endpoint on http://{health}/health");
    }

    let shutdown = server.shutdown_token();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutting down");
        }
        () = shutdown.cancelled() => info!("shutdown requested"),
    }

    server.stop_all().await;
    Ok(())
}
