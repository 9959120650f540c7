//! Error types for the Process Session subsystem

use thiserror::Error;

/// Failures before a session reaches `Running`.
///
/// No frame is ever produced for these; the caller fails the request.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Blank command text
    #[error("command is empty")]
    EmptyCommand,

    /// The platform shell could not be started
    #[error("failed to start {shell}: {source}")]
    Start {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    /// A standard stream was not captured
    #[error("failed to capture {0} pipe")]
    Pipe(&'static str),
}
