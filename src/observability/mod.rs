//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via `tracing`; every subsystem logs with
//!   field-value pairs, not formatted strings
//! - Log level configurable via config and environment

pub mod logging;
