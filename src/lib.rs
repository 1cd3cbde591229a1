//! Proxy Manager
//!
//! Keeps a durable registry of intended hostname routes consistent
//! with a live reverse-proxy engine reached through its admin API, and
//! continuously probes whether each configured route is resolvable and
//! reachable.
//!
//! # Architecture Overview
//!
//! ```text
//!   operator request                      proxy engine (admin API)
//!         │                                      ▲
//!         ▼                                      │ fetch / push
//!   ┌──────────┐    ┌────────────────┐    ┌─────────────┐
//!   │   api    │───▶│ sync           │───▶│   engine    │
//!   │ (axum)   │    │ orchestrator   │    │   client    │
//!   └──────────┘    └──────┬─────────┘    └─────────────┘
//!         │                │ compile
//!         │                ▼
//!         │         ┌────────────────┐    ┌─────────────┐
//!         │         │   document     │    │  registry   │
//!         │         │ (wire format)  │    │ (SQLite +   │
//!         │         └────────────────┘    │  snapshots) │
//!         │                               └──────▲──────┘
//!         │                                      │ write-back
//!         │         ┌────────────────┐           │
//!         └────────▶│    health      │───────────┘
//!                   │  monitor/probe │──▶ DNS + HTTP probes
//!                   └────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod document;
pub mod engine;
pub mod registry;
pub mod sync;

// Monitoring
pub mod health;

// Surfaces and cross-cutting concerns
pub mod api;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use lifecycle::Shutdown;
