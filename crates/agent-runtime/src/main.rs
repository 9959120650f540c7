//! `fleet-agent`: runs the channel server on this host.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fleet_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

/// Fleet Agent: authenticated remote command streaming and file placement
#[derive(Parser, Debug)]
#[command(name = "fleet-agent", version)]
#[command(about = "Runs shell commands for authenticated operators and streams their output")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "FLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port, overriding the file and FLEET_PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_telemetry(&TelemetryConfig::from_env("fleet-agent"))
        .context("Failed to initialize logging")?;

    let mut config = agent_runtime::load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.http.port = port;
    }

    agent_runtime::run(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
    })
    .await
}
