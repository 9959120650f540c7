//! Agent configuration with validation.

use fr_01_process_session::SessionConfig;
use serde::{Deserialize, Serialize};
use shared_crypto::{EnvelopeKeys, DEFAULT_MAX_AGE};
use shared_types::DEFAULT_PORT;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Main agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// HTTP listener
    pub http: HttpConfig,
    /// Envelope key material
    pub auth: AuthConfig,
    /// Per-session limits
    pub session: SessionSettings,
    /// File placement
    pub placement: PlacementConfig,
}

impl AgentConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.envelope_keys()?;

        if self.auth.max_age.as_secs() == 0 {
            return Err(ConfigError::InvalidTimeout("max_age cannot be 0".into()));
        }
        if self.session.heartbeat_interval.as_millis() == 0 {
            return Err(ConfigError::InvalidTimeout(
                "heartbeat_interval cannot be 0".into(),
            ));
        }
        if self.session.deadline.as_millis() == 0 {
            return Err(ConfigError::InvalidTimeout("deadline cannot be 0".into()));
        }
        if self.session.queue_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "queue_capacity cannot be 0".into(),
            ));
        }
        if self.placement.max_upload_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_upload_size cannot be 0".into(),
            ));
        }
        if self.placement.temp_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("placement.temp_root is empty".into()));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Build the verifier key material.
    pub fn envelope_keys(&self) -> Result<EnvelopeKeys, ConfigError> {
        EnvelopeKeys::new(
            self.auth.aes_key.as_bytes(),
            self.auth.hmac_key.as_bytes(),
            self.auth.shared_secret.as_bytes(),
        )
        .map(|keys| keys.with_max_age(self.auth.max_age.as_secs()))
        .map_err(|e| ConfigError::InvalidKeys(e.to_string()))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 31000)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: DEFAULT_PORT,
        }
    }
}

/// Envelope keys. All three are required; there are no built-in defaults.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// AES key, 16 or 32 bytes of UTF-8
    pub aes_key: String,
    /// HMAC-SHA256 signing key
    pub hmac_key: String,
    /// Expected plaintext of the `Auth` header
    pub shared_secret: String,
    /// Replay window
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            aes_key: String::new(),
            hmac_key: String::new(),
            shared_secret: String::new(),
            max_age: Duration::from_secs(DEFAULT_MAX_AGE),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("aes_key", &"<redacted>")
            .field("hmac_key", &"<redacted>")
            .field("shared_secret", &"<redacted>")
            .field("max_age", &self.max_age)
            .finish()
    }
}

/// Session limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// Absolute deadline from spawn
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,
    /// Output queue capacity in events
    pub queue_capacity: usize,
    /// Wait between interrupt and kill
    #[serde(with = "humantime_serde")]
    pub kill_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            heartbeat_interval: defaults.heartbeat_interval,
            deadline: defaults.deadline,
            queue_capacity: defaults.queue_capacity,
            kill_grace: defaults.kill_grace,
        }
    }
}

impl SessionSettings {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            heartbeat_interval: self.heartbeat_interval,
            deadline: self.deadline,
            queue_capacity: self.queue_capacity,
            kill_grace: self.kill_grace,
        }
    }
}

/// File placement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Uploads are staged under `<temp_root>/fleet-relay/tmp/<id>/`
    pub temp_root: PathBuf,
    /// Max upload request size in bytes (default: 1GB)
    pub max_upload_size: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir(),
            max_upload_size: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Key material rejected by the envelope
    #[error("invalid keys: {0}")]
    InvalidKeys(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or("invalid minutes")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
