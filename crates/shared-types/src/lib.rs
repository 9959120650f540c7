//! # Shared Types Crate
//!
//! Types that cross the wire between the agent and its callers.
//!
//! ## Contents
//!
//! - [`StreamEvent`] / [`EventKind`]: the unit of a command's live output
//! - [`codec`]: frame encoder and incremental line-scanner decoder
//! - [`wire`]: routes, form fields and JSON result bodies
//!
//! ## Design Principles
//!
//! - **Lossless framing**: any payload survives encode/decode unchanged.
//! - **No transport types**: nothing here depends on an HTTP stack.

pub mod codec;
pub mod errors;
pub mod event;
pub mod wire;

pub use codec::{encode, FrameDecoder};
pub use errors::*;
pub use event::*;
pub use wire::*;
