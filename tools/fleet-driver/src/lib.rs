//! # Fleet Driver
//!
//! Replays a flow file across a fleet of agents.
//!
//! ```text
//! flow.json ──FlowFile::parse──→ select(services)
//!                                    │
//!                                    ▼
//!                                 Runner ──localCmd──→ ProcessSession (this host)
//!                                    │ ──up────────→ ChannelClient::upload   (every host)
//!                                    │ ──cmd───────→ ChannelClient::connect  (every host)
//!                                    ▼
//!                                 Console (stdout / stderr)
//! ```
//!
//! Ctrl+C cancels the step in flight and stops the run.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod flow;
pub mod render;
pub mod runner;

pub use flow::{FlowError, FlowFile, ServiceFlow, Step};
pub use render::{event_lines, Console};
pub use runner::{Report, Runner, StepError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
