//! Domain registry subsystem.
//!
//! # Data Flow
//! ```text
//! sync orchestrator ──commit_mutation──▶ domains + snapshots (one tx)
//! health monitor   ──write_health─────▶ domains (health columns only)
//! api layer        ──list/find────────▶ DomainRecord
//! ```
//!
//! # Design Decisions
//! - Snapshot rows are append-only; they are the audit/rollback log
//! - Records are keyed by `incoming_address`; the key never mutates

pub mod record;
pub mod store;

pub use record::{BasicAuthCredential, DomainRecord, HealthCheckSpec};
pub use store::{RecordMutation, RegistryDb, RegistryError, Snapshot};
