//! Request payloads and input validation for the HTTP surface.
//!
//! Validation of user input happens here, upstream of the compiler;
//! anything that reaches compilation with a missing destination is a
//! programming error, not a request error.

use serde::Deserialize;

use crate::document::TransportVersion;
use crate::registry::{BasicAuthCredential, DomainRecord, HealthCheckSpec};

/// Body of `POST /domains` and `PUT /domains`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddDomainRequest {
    /// Public hostname to register.
    pub domain: String,

    #[serde(default)]
    pub destination_address: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default = "default_true")]
    pub enable_https: bool,

    #[serde(default)]
    pub enable_redirection: bool,

    #[serde(default)]
    pub redirect_to: Option<String>,

    #[serde(default)]
    pub versions: Option<Vec<TransportVersion>>,

    #[serde(default)]
    pub basic_auth: Option<BasicAuthRequest>,

    #[serde(default)]
    pub health_check: Option<HealthCheckRequest>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuthRequest {
    pub username: String,
    /// Plaintext; hashed at this boundary and never stored.
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_interval() -> u64 {
    60
}

/// Body of `POST /config/import`.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub config: serde_json::Value,
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl AddDomainRequest {
    /// Validate and convert into a registry record.
    pub fn into_record(self) -> Result<DomainRecord, Vec<FieldError>> {
        let mut errors = Vec::new();

        if !is_valid_domain(&self.domain) {
            errors.push(FieldError {
                field: "domain",
                message: "invalid domain format (must be a plain domain, e.g., example.com)",
            });
        }

        let redirect_to = self
            .redirect_to
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let record = if self.enable_redirection {
            match redirect_to {
                Some(target) if is_valid_domain(target) => {
                    let mut record = DomainRecord::redirect(&self.domain, target);
                    record.enable_https = self.enable_https;
                    record
                }
                _ => {
                    errors.push(FieldError {
                        field: "redirect_to",
                        message: "invalid redirect domain format",
                    });
                    return Err(errors);
                }
            }
        } else {
            let destination = self.destination_address.as_deref().unwrap_or("").trim();
            if !is_valid_destination(destination) {
                errors.push(FieldError {
                    field: "destination_address",
                    message: "invalid destination address format",
                });
            }
            let port = self.port.unwrap_or(0);
            if port == 0 {
                errors.push(FieldError {
                    field: "port",
                    message: "invalid port number",
                });
            }
            if !errors.is_empty() {
                return Err(errors);
            }

            let mut record = DomainRecord::proxy(&self.domain, destination, port);
            record.enable_https = self.enable_https;
            record.transport_versions = self.versions;
            record
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut record = record;
        if let Some(auth) = self.basic_auth {
            if auth.username.is_empty() || auth.password.is_empty() {
                return Err(vec![FieldError {
                    field: "basic_auth",
                    message: "username and password are required",
                }]);
            }
            match BasicAuthCredential::new(&auth.username, &auth.password) {
                Ok(credential) => record.basic_auth = Some(credential),
                Err(_) => {
                    return Err(vec![FieldError {
                        field: "basic_auth",
                        message: "password could not be hashed",
                    }]);
                }
            }
        }

        if let Some(health) = self.health_check {
            if !health.url.starts_with('/') {
                return Err(vec![FieldError {
                    field: "health_check.url",
                    message: "health check url must be an absolute path",
                }]);
            }
            record.health_check = Some(HealthCheckSpec {
                url: health.url,
                method: health.method,
                interval_secs: health.interval_secs,
            });
        }

        Ok(record)
    }
}

/// Plain registrable domain: dotted labels of alphanumerics/hyphens.
pub fn is_valid_domain(value: &str) -> bool {
    if value.is_empty() || !value.contains('.') {
        return false;
    }
    value.split('.').all(|label| {
        !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// Upstream target: a domain, an IP address, or a bare service name
/// (container-network DNS).
pub fn is_valid_destination(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    if value.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    if is_valid_domain(value) {
        return true;
    }
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
