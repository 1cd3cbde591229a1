//! Health monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! registry ──list_with_health_check──▶ monitor.rs (scheduler)
//!                                         │ fan-out probes
//!                                         ▼
//!                      probe.rs (HTTP) / dns.rs (DNS + reachability)
//!                                         │ outcome
//!                                         ▼
//!                         registry health fields (write-back)
//! ```
//!
//! # Design Decisions
//! - Probe results are advisory telemetry; routing is never touched
//! - Scheduler state is re-derived from the registry, not accumulated

pub mod dns;
pub mod monitor;
pub mod probe;

pub use dns::{CheckOutcome, DomainCheckResults, DomainChecker};
pub use monitor::HealthMonitor;
pub use probe::{HealthProber, ProbeOutcome};
