//! Synchronization subsystem.
//!
//! # Data Flow
//! ```text
//! mutation request
//!     → fetch live document (engine)
//!     → locate + compile + merge (document)
//!     → push candidate (engine, atomic reload)
//!     → persist record + snapshot (registry, one tx)
//! ```
//!
//! # Design Decisions
//! - Strictly sequential steps per operation; no rollback after push
//! - Single-writer mutex around the whole fetch→persist window

pub mod import;
pub mod orchestrator;

pub use import::ImportReport;
pub use orchestrator::{Orchestrator, SyncError};
