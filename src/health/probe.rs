//! Individual health probes.
//!
//! A probe never mutates routing; its only output is a boolean, a
//! human-readable detail string, and a timestamp, written back to the
//! record's health fields by the monitor.

use std::time::Duration;

use reqwest::Method;

use crate::health::dns::DomainChecker;
use crate::registry::record::{now_unix, DomainRecord};

/// Outcome of one probe round for one record.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub healthy: bool,
    pub detail: String,
    pub checked_at: i64,
}

/// Executes HTTP health probes and the DNS/reachability fallback.
pub struct HealthProber {
    http: reqwest::Client,
    checker: DomainChecker,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(checker: DomainChecker, timeout: Duration) -> Self {
        // 308 counts as healthy, so the probe must see it rather than
        // follow it.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            http,
            checker,
            timeout,
        }
    }

    /// Probe one record. Records with an explicit health-check URL get
    /// an HTTP probe against the incoming hostname; everything else
    /// falls back to the DNS + reachability pair.
    pub async fn probe(&self, record: &DomainRecord) -> ProbeOutcome {
        match &record.health_check {
            Some(spec) if !spec.url.trim().is_empty() => {
                self.probe_url(record, &spec.url, &spec.method).await
            }
            _ => self.probe_fallback(record).await,
        }
    }

    async fn probe_url(&self, record: &DomainRecord, path: &str, method: &str) -> ProbeOutcome {
        let scheme = if record.enable_https { "https" } else { "http" };
        let url = format!("{scheme}://{}{path}", record.incoming_address);
        let method = Method::from_bytes(method.as_bytes()).unwrap_or(Method::GET);

        let response = self
            .http
            .request(method, &url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await;

        let (healthy, detail) = match response {
            Ok(res) => {
                let status = res.status();
                if status.is_success() || status.as_u16() == 308 {
                    (true, format!("Health check succeeded ({})", status.as_u16()))
                } else {
                    (
                        false,
                        format!("Health check failed with status: {}", status.as_u16()),
                    )
                }
            }
            Err(e) if e.is_timeout() => (
                false,
                format!("Health check timed out after {}ms", self.timeout.as_millis()),
            ),
            Err(e) => (false, format!("Health check failed: {e}")),
        };

        ProbeOutcome {
            healthy,
            detail,
            checked_at: now_unix(),
        }
    }

    async fn probe_fallback(&self, record: &DomainRecord) -> ProbeOutcome {
        let results = self.checker.check_domain(&record.incoming_address).await;
        let healthy = results.dns_check.result && results.proxy_reachability.result;

        ProbeOutcome {
            healthy,
            detail: format!(
                "{} {}",
                results.dns_check.description, results.proxy_reachability.description
            ),
            checked_at: now_unix(),
        }
    }

    pub fn checker(&self) -> &DomainChecker {
        &self.checker
    }
}
