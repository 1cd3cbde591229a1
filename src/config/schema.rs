//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! control plane. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Proxy engine control-plane settings.
    pub engine: EngineConfig,

    /// The control API's own identity and bind address.
    pub api: ApiConfig,

    /// Registry storage settings.
    pub database: DatabaseConfig,

    /// Health monitor settings.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Proxy engine admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the engine's admin API (e.g., "http://127.0.0.1:2019").
    pub admin_url: String,

    /// Public IP address the engine serves traffic on. Used by the
    /// DNS/reachability checks to decide whether a hostname actually
    /// points at the proxy.
    pub public_ip: String,

    /// Admin API request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin_url: "http://127.0.0.1:2019".to_string(),
            public_ip: "127.0.0.1".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Identity and listener settings for the control API itself.
///
/// The `host`/`service_address`/`port` triple describes the locked
/// bootstrap route: the hostname under which this API is reachable
/// through the proxy engine, and the upstream it dials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Public hostname of the control API (the locked registry record).
    pub host: String,

    /// Upstream service address the engine dials for the API route.
    pub service_address: String,

    /// Upstream service port for the API route.
    pub port: u16,

    /// Bind address for the HTTP surface (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "proxy.localhost".to_string(),
            service_address: "api".to_string(),
            port: 3000,
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Registry storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "proxy-manager.db".to_string(),
        }
    }
}

/// Health monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Interval of the global registry re-scan in seconds.
    pub scan_interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 60,
            probe_timeout_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
