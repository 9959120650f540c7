//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration for a Fleet Relay binary.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error, or a full
    /// `EnvFilter` directive)
    pub log_level: String,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Whether to color the pretty output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "fleet-relay".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FLEET_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `FLEET_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `NO_COLOR`: Disable ANSI colors when set
    pub fn from_env(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: service_name.to_string(),

            log_level: lookup("FLEET_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            json_logs: lookup("FLEET_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            ansi: lookup("NO_COLOR").is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::from_lookup("fleet-agent", lookup(&[]));
        assert_eq!(config.service_name, "fleet-agent");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
        assert!(config.ansi);
    }

    #[test]
    fn test_fleet_level_wins_over_rust_log() {
        let config = TelemetryConfig::from_lookup(
            "fleet-agent",
            lookup(&[("FLEET_LOG_LEVEL", "debug"), ("RUST_LOG", "warn")]),
        );
        assert_eq!(config.log_level, "debug");

        let config = TelemetryConfig::from_lookup("fleet-agent", lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_json_logs() {
        let config =
            TelemetryConfig::from_lookup("fleet-agent", lookup(&[("FLEET_JSON_LOGS", "1")]));
        assert!(config.json_logs);

        let config =
            TelemetryConfig::from_lookup("fleet-agent", lookup(&[("DOCKER_CONTAINER", "yes")]));
        assert!(config.json_logs);

        let config = TelemetryConfig::from_lookup(
            "fleet-agent",
            lookup(&[("DOCKER_CONTAINER", "yes"), ("FLEET_JSON_LOGS", "false")]),
        );
        assert!(!config.json_logs);
    }
}
