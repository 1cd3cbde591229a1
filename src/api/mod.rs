//! HTTP surface for operators.
//!
//! A thin axum router over the orchestrator, the registry, and the
//! health monitor. Request validation lives in `schema`; everything
//! else delegates.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::health::{DomainChecker, HealthMonitor};
use crate::sync::Orchestrator;

pub mod handlers;
pub mod schema;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub monitor: Arc<HealthMonitor>,
    pub checker: Arc<DomainChecker>,
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/domains",
            get(handlers::list_domains)
                .post(handlers::add_domain)
                .put(handlers::upsert_domain),
        )
        .route("/domains/{host}", delete(handlers::remove_domain))
        .route("/config", get(handlers::get_live_config))
        .route("/config/import", post(handlers::import_config))
        .route("/health/start", post(handlers::health_start))
        .route("/health/stop", post(handlers::health_stop))
        .route("/health/run", post(handlers::health_run))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
