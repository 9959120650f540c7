//! `fleet-driver`: replays a flow file across the fleet.

use std::future::Future;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use fleet_driver::{Console, FlowFile, Runner};
use fleet_telemetry::{init_telemetry, TelemetryConfig};
use shared_crypto::{EnvelopeKeys, EnvelopeSigner};
use tokio::sync::watch;
use tracing::{info, warn};

/// Fleet Driver: builds locally, uploads and restarts services on agents
#[derive(Parser, Debug)]
#[command(name = "fleet-driver", version)]
#[command(about = "Runs flow steps against Fleet Relay agents")]
struct Args {
    /// Flow file
    #[arg(short, long, env = "FLEET_FLOW", default_value = "flow.json")]
    flow: PathBuf,

    /// Service to run (repeatable)
    #[arg(short, long = "service")]
    services: Vec<String>,

    /// Run every service in the file
    #[arg(long, conflicts_with = "services")]
    all: bool,

    /// List services and exit
    #[arg(long)]
    list: bool,

    #[arg(long, env = "FLEET_AES_KEY", hide_env_values = true)]
    aes_key: Option<String>,

    #[arg(long, env = "FLEET_HMAC_KEY", hide_env_values = true)]
    hmac_key: Option<String>,

    #[arg(long, env = "FLEET_SHARED_SECRET", hide_env_values = true)]
    secret: Option<String>,
}

impl Args {
    fn signer(&self) -> Result<EnvelopeSigner> {
        let (Some(aes), Some(hmac), Some(secret)) = (&self.aes_key, &self.hmac_key, &self.secret)
        else {
            bail!("--aes-key, --hmac-key and --secret are required (or FLEET_* variables)");
        };
        let keys = EnvelopeKeys::new(aes.as_bytes(), hmac.as_bytes(), secret.as_bytes())
            .context("Invalid envelope keys")?;
        Ok(EnvelopeSigner::new(keys))
    }
}

/// Raise the interrupt flag once `signal` resolves.
fn interrupt_on<F>(signal: F) -> watch::Receiver<bool>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        signal.await;
        warn!("Interrupted; stopping after the current step is cancelled");
        let _ = tx.send(true);
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_telemetry(&TelemetryConfig::from_env("fleet-driver"))
        .context("Failed to initialize logging")?;

    let file = FlowFile::load(&args.flow)?;
    if args.list {
        for name in file.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let signer = args.signer()?;
    let selected = file.select(&args.services, args.all)?;
    info!(
        flow = %args.flow.display(),
        services = selected.len(),
        "Starting flow"
    );

    let interrupt = interrupt_on(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    });

    let mut runner = Runner::new(signer, interrupt, Console::stdio());
    let report = runner.run(&selected).await;

    info!(
        succeeded = report.succeeded,
        failed = report.failures.len(),
        interrupted = report.interrupted,
        "Flow finished"
    );
    if report.interrupted {
        bail!("interrupted");
    }
    if !report.failures.is_empty() {
        bail!("{} step(s) failed", report.failures.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "fleet-driver",
            "--flow",
            "deploy.json",
            "-s",
            "billing",
            "-s",
            "web",
        ])
        .unwrap();
        assert_eq!(args.flow, PathBuf::from("deploy.json"));
        assert_eq!(args.services, vec!["billing", "web"]);
        assert!(!args.all);
    }

    #[test]
    fn test_all_conflicts_with_service() {
        assert!(Args::try_parse_from(["fleet-driver", "--all", "-s", "web"]).is_err());
    }

    #[test]
    fn test_signer_requires_keys() {
        let args = Args::try_parse_from([
            "fleet-driver",
            "--aes-key",
            "0123456789abcdef",
            "--hmac-key",
            "hmac",
            "--secret",
            "secret",
        ])
        .unwrap();
        assert!(args.signer().is_ok());

        let mut partial = args;
        partial.secret = None;
        assert!(partial.signer().is_err());
    }

    #[test]
    fn test_interrupt_on() {
        tokio_test::block_on(async {
            let mut rx = interrupt_on(async {});
            assert!(rx.wait_for(|flag| *flag).await.is_ok());
        });
    }
}
