//! Domain record types: the unit the registry stores and the
//! orchestrator reconciles.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::TransportVersion;

/// Seconds since the Unix epoch.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One intended hostname route, proxy or redirect.
///
/// `incoming_address` is the globally unique key and immutable once
/// created; changing it means delete + recreate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: Uuid,

    /// Public hostname matched by the compiled route.
    pub incoming_address: String,

    /// Upstream the proxy dials. Unused when the record is a redirect.
    pub destination_address: String,

    /// Upstream port. Zero is only meaningful for redirect records.
    pub port: u16,

    /// Whether the compiled route dials the upstream over TLS.
    pub enable_https: bool,

    /// Redirect target. Presence makes this a redirect record,
    /// regardless of what the proxy fields hold.
    pub redirect_url: Option<String>,

    /// Restriction of the upstream HTTP versions; `None` means engine
    /// defaults.
    pub transport_versions: Option<Vec<TransportVersion>>,

    /// Basic-auth credential guarding the route.
    pub basic_auth: Option<BasicAuthCredential>,

    /// Active health probing configuration; `None` disables probing
    /// (the DNS/reachability fallback still runs on listing).
    pub health_check: Option<HealthCheckSpec>,

    /// Set only on the record for the control API's own route; a
    /// locked record can never be deleted.
    pub is_locked: bool,

    /// Outcome of the most recent probe. Written only by the health
    /// monitor.
    pub last_health_status: Option<bool>,

    /// Human-readable detail for the most recent probe.
    pub last_health_detail: Option<String>,

    /// Unix timestamp of the most recent probe.
    pub last_checked_at: Option<i64>,

    pub created_at: i64,
}

impl DomainRecord {
    /// New proxy record with defaults (plaintext upstream, no auth,
    /// no probing).
    pub fn proxy(incoming: &str, destination: &str, port: u16) -> Self {
        Self {
            id: Uuid::new_v4(),
            incoming_address: incoming.to_string(),
            destination_address: destination.to_string(),
            port,
            enable_https: false,
            redirect_url: None,
            transport_versions: None,
            basic_auth: None,
            health_check: None,
            is_locked: false,
            last_health_status: None,
            last_health_detail: None,
            last_checked_at: None,
            created_at: now_unix(),
        }
    }

    /// New redirect record. The destination fields mirror the target
    /// for display purposes but compilation ignores them.
    pub fn redirect(incoming: &str, target: &str) -> Self {
        let mut record = Self::proxy(incoming, target, 0);
        record.redirect_url = Some(target.to_string());
        record
    }

    /// The redirect target, if this is semantically a redirect record.
    /// Whitespace-only targets are treated as absent.
    pub fn redirect_target(&self) -> Option<&str> {
        self.redirect_url
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Username + salted password hash for the authentication stage.
///
/// The plaintext password is hashed at the API boundary and never
/// stored or compiled into a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuthCredential {
    pub username: String,
    pub password_hash: String,
}

impl BasicAuthCredential {
    /// Hash a plaintext password with bcrypt.
    pub fn new(username: &str, plaintext: &str) -> Result<Self, bcrypt::BcryptError> {
        Ok(Self {
            username: username.to_string(),
            password_hash: bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)?,
        })
    }

    /// Wrap an already-hashed credential (imports, storage reads).
    pub fn from_hash(username: &str, password_hash: &str) -> Self {
        Self {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        }
    }
}

/// Active health probe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    /// Path probed on the incoming hostname (e.g., "/health").
    pub url: String,

    /// HTTP method for the probe.
    pub method: String,

    /// Per-record probe interval in seconds.
    pub interval_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_target_ignores_whitespace() {
        let mut record = DomainRecord::proxy("a.example.com", "10.0.0.1", 80);
        assert!(record.redirect_target().is_none());

        record.redirect_url = Some("   ".to_string());
        assert!(record.redirect_target().is_none());

        record.redirect_url = Some(" new.example.com ".to_string());
        assert_eq!(record.redirect_target(), Some("new.example.com"));
    }

    #[test]
    fn credential_hashing_never_keeps_plaintext() {
        let credential = BasicAuthCredential::new("a", "b").unwrap();
        assert_ne!(credential.password_hash, "b");
        assert!(bcrypt::verify("b", &credential.password_hash).unwrap());
    }
}
