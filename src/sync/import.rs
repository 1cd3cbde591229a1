//! Bulk import of a fully formed configuration document.
//!
//! The document is pushed wholesale (same push→snapshot shape as
//! single-route mutations), then decomposed back into registry records
//! one route at a time. Per-route failures are counted, never fatal to
//! the batch.

use serde::Serialize;

use crate::document::{decompose_route, Document};
use crate::registry::RecordMutation;
use crate::sync::orchestrator::{Orchestrator, SyncError};

/// Outcome of an import: how many routes became registry records.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ImportReport {
    pub success: usize,
    pub failed: usize,
}

impl Orchestrator {
    /// Replace the live configuration with a supplied raw document and
    /// rebuild registry records from its routes.
    pub async fn import_document(
        &self,
        raw: serde_json::Value,
    ) -> Result<ImportReport, SyncError> {
        let document: Document = serde_json::from_value(raw)
            .map_err(|e| SyncError::InvalidDocument(e.to_string()))?;

        let _guard = self.acquire_write_lock().await;

        // Push + snapshot atomically; records follow individually.
        self.push_and_persist(document.clone(), RecordMutation::None)
            .await?;

        let mut report = ImportReport::default();
        for fragment in document.routes() {
            match decompose_route(fragment) {
                Ok(record) => {
                    // Never unlock or overwrite the control plane's own record.
                    if let Ok(Some(existing)) =
                        self.registry().find_by_host(&record.incoming_address)
                    {
                        if existing.is_locked {
                            continue;
                        }
                    }
                    match self.registry().upsert_record(&record) {
                        Ok(()) => report.success += 1,
                        Err(e) => {
                            tracing::warn!(
                                host = %record.incoming_address,
                                error = %e,
                                "imported route could not be persisted"
                            );
                            report.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "imported route could not be decomposed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            success = report.success,
            failed = report.failed,
            "configuration import finished"
        );
        Ok(report)
    }
}
