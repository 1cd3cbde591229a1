//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check the engine admin URL and public IP parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;

use crate::config::schema::AppConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate the full configuration, collecting every failure.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if url::Url::parse(&config.engine.admin_url).is_err() {
        errors.push(err("engine.admin_url", "not a valid URL"));
    }
    if config.engine.public_ip.parse::<IpAddr>().is_err() {
        errors.push(err("engine.public_ip", "not a valid IP address"));
    }
    if config.engine.request_timeout_secs == 0 {
        errors.push(err("engine.request_timeout_secs", "must be greater than zero"));
    }

    if config.api.host.is_empty() {
        errors.push(err("api.host", "must not be empty"));
    }
    if config.api.service_address.is_empty() {
        errors.push(err("api.service_address", "must not be empty"));
    }
    if config.api.port == 0 {
        errors.push(err("api.port", "must be a valid port"));
    }
    if config.api.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(err("api.bind_address", "not a valid socket address"));
    }

    if config.database.path.is_empty() {
        errors.push(err("database.path", "must not be empty"));
    }

    if config.health.scan_interval_secs == 0 {
        errors.push(err("health.scan_interval_secs", "must be greater than zero"));
    }
    if config.health.probe_timeout_secs == 0 {
        errors.push(err("health.probe_timeout_secs", "must be greater than zero"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = AppConfig::default();
        config.engine.admin_url = "not a url".to_string();
        config.engine.public_ip = "nope".to_string();
        config.api.port = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "engine.public_ip"));
    }
}
