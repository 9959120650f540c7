//! # Channel Server
//!
//! Agent-side HTTP endpoint: authenticated command streaming plus file
//! placement.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     CHANNEL SERVER (fr-02)                       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  TcpListener ──→ hyper http1 conn (per connection Tripwire)     │
//! │                        │                                         │
//! │  ┌─────────────────────┴───────────────────────┐                 │
//! │  │  Tracing → Auth (envelope, fail-closed)     │                 │
//! │  └─────────────────────┬───────────────────────┘                 │
//! │                        │                                         │
//! │  ┌──────────────┬──────┴───────┬─────────────┐                   │
//! │  │ executeCmdSse│ uploadToPath │  moveFile   │   /health         │
//! │  │ (event       │ Replace      │             │                   │
//! │  │  stream)     │ (placement)  │ (placement) │                   │
//! │  └──────┬───────┴──────────────┴─────────────┘                   │
//! │         │                                                        │
//! │  ProcessSession (fr-01) ──→ LiveSessions (cancel on shutdown)    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security
//!
//! A request with a missing, stale, forged or wrongly-keyed envelope gets no
//! status line, no headers and no body: the connection is dropped. The
//! reason is only ever logged at debug level.
//!
//! ## Usage
//!
//! ```ignore
//! use fr_02_channel_server::{AgentConfig, ChannelServer};
//!
//! let mut server = ChannelServer::new(config)?;
//! server.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod placement;
pub mod service;
pub mod sessions;

pub use domain::{
    AgentConfig, AuthConfig, ConfigError, HttpConfig, PlacementConfig, ServerError,
    SessionSettings,
};
pub use handlers::AppState;
pub use middleware::{ChannelMetrics, MetricsSnapshot};
pub use placement::{move_file, replace_path, PlacementError, Staging};
pub use service::ChannelServer;
pub use sessions::LiveSessions;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
