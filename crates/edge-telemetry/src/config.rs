//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to format logs as JSON lines
    pub json_logs: bool,

    /// Whether to register Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "edge-validator".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EDGE_SERVICE_NAME`: Service name (default: edge-validator)
    /// - `EDGE_LOG_LEVEL`, `LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `EDGE_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `EDGE_LOG_JSON` or `LOG_JSON`: Enable JSON logs (default: false, true in containers)
    /// - `EDGE_METRICS_ENABLED`: Register Prometheus metrics (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("EDGE_SERVICE_NAME")
                .unwrap_or_else(|_| "edge-validator".to_string()),

            log_level: env::var("EDGE_LOG_LEVEL")
                .or_else(|_| env::var("LOG_LEVEL"))
                .or_else(|_| env::var("RUST_LOG"))
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("EDGE_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            json_logs: env::var("EDGE_LOG_JSON")
                .or_else(|_| env::var("LOG_JSON"))
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            metrics_enabled: env::var("EDGE_METRICS_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
        }
    }

    /// Override the log level (e.g. from a CLI flag).
    #[must_use]
    pub fn with_log_level(mut self, level: &str) -> Self {
        self.log_level = level.to_lowercase();
        self
    }

    /// Override JSON formatting.
    #[must_use]
    pub fn with_json(mut self, json_logs: bool) -> Self {
        self.json_logs = json_logs;
        self
    }
}

/// Accepts `true/false`, `1/0`, `yes/no`, `on/off`. Anything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
