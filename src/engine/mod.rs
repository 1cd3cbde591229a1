//! Live-config client for the proxy engine's admin API.

pub mod client;

pub use client::{EngineClient, EngineError};
