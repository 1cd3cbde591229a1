//! DNS and proxy-reachability checks.
//!
//! # Responsibilities
//! - Verify a hostname resolves to the proxy engine's public IP
//! - Verify a request for that hostname actually reaches the engine
//!
//! These are the fallback checks for routes without an explicit
//! health-check URL, and the per-domain check results returned by the
//! listing endpoint.

use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use reqwest::header::HOST;

/// One boolean check plus a human-readable description.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckOutcome {
    pub result: bool,
    pub description: String,
}

/// Results of the two fallback checks for one domain.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DomainCheckResults {
    pub dns_check: CheckOutcome,
    pub proxy_reachability: CheckOutcome,
}

/// Performs DNS and reachability checks against the engine's public IP.
pub struct DomainChecker {
    resolver: TokioAsyncResolver,
    engine_ip: IpAddr,
    http: reqwest::Client,
    timeout: Duration,
}

impl DomainChecker {
    pub fn new(engine_ip: IpAddr, timeout: Duration) -> Self {
        // Reachability must observe the engine's own status line, so
        // redirects are not followed.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            resolver: TokioAsyncResolver::tokio(
                ResolverConfig::default(),
                ResolverOpts::default(),
            ),
            engine_ip,
            http,
            timeout,
        }
    }

    /// Whether the domain resolves to the engine's public IP.
    /// A failed lookup is a negative result, never an error.
    pub async fn check_dns(&self, domain: &str) -> bool {
        match self.resolver.lookup_ip(domain).await {
            Ok(lookup) => lookup.iter().any(|addr| addr == self.engine_ip),
            Err(_) => false,
        }
    }

    /// Whether an HTTP HEAD sent to the engine IP with the domain as
    /// `Host` header comes back 200 or 308.
    pub async fn check_reachability(&self, domain: &str) -> bool {
        let url = match self.engine_ip {
            IpAddr::V4(ip) => format!("http://{ip}/"),
            IpAddr::V6(ip) => format!("http://[{ip}]/"),
        };

        let response = self
            .http
            .head(url)
            .header(HOST, domain)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(res) => {
                let status = res.status().as_u16();
                status == 200 || status == 308
            }
            Err(_) => false,
        }
    }

    /// Run both checks concurrently.
    pub async fn check_domain(&self, domain: &str) -> DomainCheckResults {
        let (dns, reachable) =
            tokio::join!(self.check_dns(domain), self.check_reachability(domain));

        DomainCheckResults {
            dns_check: CheckOutcome {
                result: dns,
                description: if dns {
                    "Domain correctly resolves to proxy IP.".to_string()
                } else {
                    "Domain does not resolve to proxy IP.".to_string()
                },
            },
            proxy_reachability: CheckOutcome {
                result: reachable,
                description: if reachable {
                    "Requests successfully reach the proxy.".to_string()
                } else {
                    "Requests do not reach the proxy.".to_string()
                },
            },
        }
    }
}
