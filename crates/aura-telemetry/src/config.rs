//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for tracing and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for traces and logs (`aura-core`, `aura-gateway`).
    pub service_name: String,

    /// OTLP endpoint for trace export.
    pub otlp_endpoint: String,

    /// Whether to export traces at all. Off by default in development so the
    /// services run without a collector.
    pub otlp_enabled: bool,

    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Whether to emit JSON-formatted logs (default in containers).
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "aura-core".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
            otlp_enabled: false,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: service name (default: aura-core)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint (default: http://localhost:4317)
    /// - `AURA_OTEL_ENABLED`: enable OTLP export (default: false)
    /// - `AURA_LOG_LEVEL` or `RUST_LOG`: log level (default: info)
    /// - `AURA_JSON_LOGS`: JSON log output (default: true in containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "aura-core".to_string()),

            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),

            otlp_enabled: env::var("AURA_OTEL_ENABLED")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),

            log_level: env::var("AURA_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("AURA_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),
        }
    }

    /// Configuration for a named service, env overrides applied on top.
    pub fn for_service(service_name: &str) -> Self {
        let mut config = Self::from_env();
        if env::var("OTEL_SERVICE_NAME").is_err() {
            config.service_name = service_name.to_string();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "aura-core");
        assert_eq!(config.log_level, "info");
        assert!(!config.otlp_enabled);
    }

    #[test]
    fn test_for_service() {
        let config = TelemetryConfig::for_service("aura-gateway");
        assert!(!config.service_name.is_empty());
    }
}
