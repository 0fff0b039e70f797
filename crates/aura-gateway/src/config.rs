//! # Gateway Configuration
//!
//! Same layering as the core: optional `aura.toml` plus `AURA_*`
//! environment variables (`AURA_GATEWAY__PORT=8000`,
//! `AURA_SECURITY__TIMESTAMP_TOLERANCE_SECONDS=60`, ...).

use serde::Deserialize;

use crate::error::GatewayError;

/// HTTP server and upstream settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Bind host.
    pub host: String,
    /// HTTP port.
    pub port: u16,
    /// Core gRPC endpoint.
    pub core_endpoint: String,
    /// Allowed CORS origins; `*` means any.
    pub cors_origins: Vec<String>,
    /// Readiness-probe deadline in milliseconds.
    pub health_check_timeout_ms: u64,
    /// Log a warning when a health check takes longer than this.
    pub health_check_slow_threshold_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            core_endpoint: "http://127.0.0.1:50051".to_string(),
            cors_origins: vec!["*".to_string()],
            health_check_timeout_ms: 2000,
            health_check_slow_threshold_ms: 100,
        }
    }
}

/// Inbound security settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Allowed clock skew for signed requests, seconds.
    pub timestamp_tolerance_seconds: u64,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            timestamp_tolerance_seconds: 60,
        }
    }
}

/// Root gateway settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// HTTP server and upstream.
    pub gateway: GatewaySection,
    /// Inbound security.
    pub security: SecuritySection,
}

impl GatewaySettings {
    /// Load from `aura.toml` (optional) and the environment.
    pub fn load() -> Result<Self, GatewayError> {
        ::config::Config::builder()
            .add_source(::config::File::with_name("aura").required(false))
            .add_source(
                ::config::Environment::with_prefix("AURA")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("gateway.cors_origins"),
            )
            .build()
            .and_then(::config::Config::try_deserialize)
            .map_err(|e| GatewayError::Config(e.to_string()))
    }
}
