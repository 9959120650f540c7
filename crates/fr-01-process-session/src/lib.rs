//! # Process Session Subsystem
//!
//! Turns one shell command into a live, ordered stream of [`StreamEvent`]s.
//!
//! ## Lifecycle
//!
//! ```text
//! [IDLE] ──spawn──→ [RUNNING] ──both pipes EOF + exit──→ [COMPLETED]
//!                       │
//!                       ├──deadline / cancel / disconnect──→ [CANCELLED]
//!                       │
//!                       └──wait error──→ [FAILED]
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement |
//! |-----------|-------------|
//! | Exactly one `end` event | `queue.rs` - `finish()` compare-exchange |
//! | Close-once output queue | `queue.rs` - sender taken under lock |
//! | No detached process | `shell.rs` - group interrupt then kill |
//! | Producers never block past cancel | `reader.rs` - `push_unless_cancelled()` |
//! | Liveness during silence | `session.rs` - heartbeat in `next_event()` |
//!
//! Data from one pipe keeps its byte order. Stdout and stderr are two
//! independent producers and are not ordered against each other.
//!
//! [`StreamEvent`]: shared_types::StreamEvent

pub mod config;
pub mod error;
pub mod queue;
pub mod reader;
pub mod session;
pub mod shell;
pub mod state;

pub use config::SessionConfig;
pub use error::SpawnError;
pub use session::{CancelHandle, ProcessSession};
pub use shell::{platform_shell, Shell};
pub use state::{CancelReason, SessionState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
