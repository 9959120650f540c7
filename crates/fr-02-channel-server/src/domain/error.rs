//! Server lifecycle errors.

use std::net::SocketAddr;
use thiserror::Error;

use super::config::ConfigError;

/// Errors raised while starting or running the channel server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// `start()` called on a server that is already running
    #[error("server already started")]
    AlreadyStarted,

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
