//! HTTP client for the proxy engine's admin endpoint.
//!
//! # Responsibilities
//! - Fetch the full live configuration document
//! - Push a complete replacement document (atomic engine-side reload)
//!
//! # Design Decisions
//! - Exactly two operations; no retries here (retry policy, if any,
//!   belongs to the orchestrator)
//! - 4xx means the engine rejected the document; everything else that
//!   goes wrong on the wire is `Unreachable`

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::EngineConfig;
use crate::document::Document;

/// Errors from the engine control plane.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Network error, timeout, or engine-side 5xx.
    #[error("engine unreachable: {0}")]
    Unreachable(String),

    /// The engine rejected the document (4xx).
    #[error("engine rejected document ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The engine answered with something that is not a document.
    #[error("engine response malformed: {0}")]
    Malformed(String),

    /// The configured admin URL is unusable.
    #[error("invalid admin URL '{url}': {reason}")]
    BadAdminUrl { url: String, reason: String },
}

/// Thin wrapper over the engine's two admin primitives.
#[derive(Clone)]
pub struct EngineClient {
    base: Url,
    http: reqwest::Client,
    timeout: Duration,
}

impl EngineClient {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let base = Url::parse(&config.admin_url).map_err(|e| EngineError::BadAdminUrl {
            url: config.admin_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            base,
            http: reqwest::Client::new(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, EngineError> {
        self.base.join(path).map_err(|e| EngineError::BadAdminUrl {
            url: self.base.to_string(),
            reason: e.to_string(),
        })
    }

    /// GET the full live configuration.
    pub async fn fetch_document(&self) -> Result<Document, EngineError> {
        let url = self.endpoint("config/")?;
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        response
            .json::<Document>()
            .await
            .map_err(|e| EngineError::Malformed(e.to_string()))
    }

    /// POST a complete replacement document. The engine applies it
    /// all-or-nothing and echoes the accepted configuration (possibly
    /// empty on a no-op).
    pub async fn push_document(&self, document: &Document) -> Result<Document, EngineError> {
        let url = self.endpoint("load")?;
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(document)
            .send()
            .await
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        // Some engines reply with an empty body on /load; treat that
        // as an echo of what we sent.
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(document.clone());
        }
        serde_json::from_str(&body).map_err(|e| EngineError::Malformed(e.to_string()))
    }
}

fn classify_status(status: u16, body: String) -> EngineError {
    if (400..500).contains(&status) {
        EngineError::Rejected { status, body }
    } else {
        EngineError::Unreachable(format!("engine returned status {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_xx_is_rejection_five_xx_is_unreachable() {
        assert!(matches!(
            classify_status(400, String::new()),
            EngineError::Rejected { status: 400, .. }
        ));
        assert!(matches!(
            classify_status(502, String::new()),
            EngineError::Unreachable(_)
        ));
    }

    #[test]
    fn rejects_unparseable_admin_url() {
        let config = EngineConfig {
            admin_url: "not a url".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            EngineClient::new(&config),
            Err(EngineError::BadAdminUrl { .. })
        ));
    }
}
