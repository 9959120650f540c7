//! # Channel Client
//!
//! Operator side of the channel: sends an authenticated request to an agent
//! and turns the streamed response back into [`StreamEvent`]s.
//!
//! ```text
//! connect() ──POST multipart + envelope──→ agent
//!     │
//!     └─ 200 text/event-stream ──→ ReadTask ──FrameDecoder──┬─→ events() (cap 100, 100ms)
//!                                     ▲                     └─→ errors() (cap 10)
//!                           close() ──┘ done signal
//! ```
//!
//! An agent that rejects the envelope closes the connection without a
//! response; `connect()` reports that as [`ClientError::ConnectionClosed`].
//!
//! ## Usage
//!
//! ```ignore
//! use fr_03_channel_client::ChannelClient;
//! use futures::StreamExt;
//!
//! let client = ChannelClient::for_command("10.0.0.5:31000", signer, "uptime")?;
//! client.connect().await?;
//! let mut events = client.events()?;
//! while let Some(event) = events.next().await {
//!     println!("{}: {}", event.kind, event.payload);
//! }
//! ```
//!
//! [`StreamEvent`]: shared_types::StreamEvent

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod form;
mod stream;

pub use client::{normalize_base_url, ChannelClient, LAST_EVENT_ID};
pub use config::ClientConfig;
pub use error::ClientError;
pub use form::FormSpec;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
