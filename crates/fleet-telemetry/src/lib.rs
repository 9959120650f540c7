//! # Fleet Telemetry
//!
//! Tracing subscriber setup shared by `fleet-agent` and `fleet-driver`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleet_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_telemetry(&TelemetryConfig::from_env("fleet-agent"))?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FLEET_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `FLEET_JSON_LOGS` | `false` | JSON lines instead of pretty output |
//! | `NO_COLOR` | unset | Disable ANSI colors |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("failed to install subscriber: {0}")]
    SubscriberInit(String),
}

/// Initialize logging. Call once, early in `main`.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    init_tracing(config)
}
