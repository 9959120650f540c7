//! Domain layer: configuration and error types.

pub mod config;
pub mod error;

pub use config::{
    AgentConfig, AuthConfig, ConfigError, HttpConfig, PlacementConfig, SessionSettings,
};
pub use error::ServerError;
