//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_SERVICE_NAME: &str = "server-comm";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration for structured logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error or an EnvFilter directive)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Route output through the test harness capture
    #[serde(default)]
    pub test_writer: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            console_output: true,
            json_logs: false,
            test_writer: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: server-comm)
    /// - `COMM_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `COMM_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `COMM_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Configuration suited to `cargo test`: debug level, captured output.
    pub fn for_tests() -> Self {
        Self {
            log_level: "debug".to_string(),
            test_writer: true,
            ..Self::default()
        }
    }

    /// Builder-style method to set the service name
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("OTEL_SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),

            log_level: lookup("COMM_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),

            console_output: lookup("COMM_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: lookup("COMM_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            test_writer: false,
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
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "server-comm");
        assert_eq!(config.log_level, "info");
        assert!(config.console_output);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_comm_log_level_wins_over_rust_log() {
        let config = TelemetryConfig::from_lookup(lookup(&[
            ("COMM_LOG_LEVEL", "debug"),
            ("RUST_LOG", "warn"),
        ]));
        assert_eq!(config.log_level, "debug");

        let config = TelemetryConfig::from_lookup(lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_flags_parse() {
        let config = TelemetryConfig::from_lookup(lookup(&[
            ("COMM_CONSOLE_OUTPUT", "0"),
            ("COMM_JSON_LOGS", "TRUE"),
            ("OTEL_SERVICE_NAME", "echo"),
        ]));
        assert!(!config.console_output);
        assert!(config.json_logs);
        assert_eq!(config.service_name, "echo");
    }

    #[test]
    fn test_containers_default_to_json() {
        let config = TelemetryConfig::from_lookup(lookup(&[("DOCKER_CONTAINER", "1")]));
        assert!(config.json_logs);
    }
}
