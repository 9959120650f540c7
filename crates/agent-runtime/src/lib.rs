//! # Fleet Agent Runtime
//!
//! Startup for the `fleet-agent` binary.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (`FLEET_LOG_LEVEL`, `FLEET_JSON_LOGS`)
//! 2. Load configuration: JSON file, then environment overrides
//! 3. Validate keys and limits; refuse to start on any error
//! 4. Serve until Ctrl+C, then cancel live sessions
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `FLEET_AES_KEY` | `auth.aes_key` |
//! | `FLEET_HMAC_KEY` | `auth.hmac_key` |
//! | `FLEET_SHARED_SECRET` | `auth.shared_secret` |
//! | `FLEET_HOST` | `http.host` |
//! | `FLEET_PORT` | `http.port` |
//! | `FLEET_TEMP_ROOT` | `placement.temp_root` |

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use fr_02_channel_server::{AgentConfig, ChannelServer};
use tracing::{info, warn};

/// Load configuration from an optional JSON file, then apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        }
        None => AgentConfig::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate().context("Invalid agent configuration")?;
    Ok(config)
}

/// Apply `FLEET_*` overrides read through `lookup`.
pub fn apply_overrides<F>(config: &mut AgentConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup("FLEET_AES_KEY") {
        config.auth.aes_key = key;
        info!("Loaded AES key from environment");
    }
    if let Some(key) = lookup("FLEET_HMAC_KEY") {
        config.auth.hmac_key = key;
        info!("Loaded HMAC key from environment");
    }
    if let Some(secret) = lookup("FLEET_SHARED_SECRET") {
        config.auth.shared_secret = secret;
        info!("Loaded shared secret from environment");
    }

    if let Some(host) = lookup("FLEET_HOST") {
        match host.parse() {
            Ok(h) => config.http.host = h,
            Err(_) => warn!(%host, "FLEET_HOST is not an IP address; ignored"),
        }
    }
    if let Some(port) = lookup("FLEET_PORT") {
        match port.parse() {
            Ok(p) => config.http.port = p,
            Err(_) => warn!(%port, "FLEET_PORT is not a port number; ignored"),
        }
    }
    if let Some(root) = lookup("FLEET_TEMP_ROOT") {
        config.placement.temp_root = root.into();
    }
}

/// Run the channel server until `shutdown` resolves.
pub async fn run<F>(config: AgentConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let server = ChannelServer::new(config).context("Failed to create channel server")?;
    let listener = server.bind().await.context("Failed to bind")?;

    info!("===========================================");
    info!("  Fleet Agent v{}", fr_02_channel_server::VERSION);
    info!("===========================================");
    info!("Listen: {}", listener.local_addr().context("listener address")?);
    info!("Temp root: {:?}", server.config().placement.temp_root);

    server
        .serve(listener, shutdown)
        .await
        .context("Channel server failed")?;
    Ok(())
}
