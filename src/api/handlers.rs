//! HTTP handlers exposing the orchestrator and the health monitor.
//!
//! Authentication/authorization of callers is owned by the deployment
//! front (reverse proxy, gateway, or middleware) and is deliberately
//! absent here.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::future::join_all;
use serde_json::json;

use crate::api::schema::{AddDomainRequest, FieldError, ImportRequest};
use crate::api::AppState;
use crate::document::Document;
use crate::health::DomainCheckResults;
use crate::registry::DomainRecord;
use crate::sync::SyncError;

/// Error envelope returned by every handler.
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    fn validation(errors: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "error": "Validation Failed", "details": errors }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let status = match &err {
            SyncError::DuplicateRoute { .. } => StatusCode::CONFLICT,
            SyncError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            SyncError::LockedRoute { .. } => StatusCode::FORBIDDEN,
            SyncError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
            SyncError::Engine(_) => StatusCode::BAD_GATEWAY,
            SyncError::Compile(_)
            | SyncError::Registry(_)
            | SyncError::PostPushPersistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

/// `POST /domains`: register a new route.
pub async fn add_domain(
    State(state): State<AppState>,
    Json(request): Json<AddDomainRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = request.into_record().map_err(ApiError::validation)?;
    state.orchestrator.add_route(record).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Domain added successfully!" })),
    ))
}

/// `PUT /domains`: register or replace a route.
pub async fn upsert_domain(
    State(state): State<AppState>,
    Json(request): Json<AddDomainRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = request.into_record().map_err(ApiError::validation)?;
    state.orchestrator.update_or_add_route(record).await?;
    Ok(Json(json!({ "message": "Domain updated successfully!" })))
}

/// `DELETE /domains/{host}`: remove a route and its record.
pub async fn remove_domain(
    State(state): State<AppState>,
    Path(host): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.orchestrator.remove_route(&host).await?;
    Ok(Json(json!({ "message": "Domain deleted successfully!" })))
}

/// Registry record enriched with on-demand check results.
#[derive(serde::Serialize)]
pub struct DomainWithChecks {
    #[serde(flatten)]
    pub record: DomainRecord,
    pub check_results: DomainCheckResults,
}

/// `GET /domains`: list records with DNS/reachability results.
pub async fn list_domains(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state
        .orchestrator
        .registry()
        .list_all()
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let checks = join_all(
        records
            .iter()
            .map(|record| state.checker.check_domain(&record.incoming_address)),
    )
    .await;

    let data: Vec<DomainWithChecks> = records
        .into_iter()
        .zip(checks)
        .map(|(record, check_results)| DomainWithChecks {
            record,
            check_results,
        })
        .collect();

    Ok(Json(json!({ "total": data.len(), "data": data })))
}

/// `GET /config`: the engine's current live document.
pub async fn get_live_config(
    State(state): State<AppState>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.orchestrator.live_document().await?))
}

/// `POST /config/import`: replace the live document wholesale.
pub async fn import_config(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.orchestrator.import_document(request.config).await?;
    Ok(Json(json!({
        "message": "Configuration imported successfully",
        "success": report.success,
        "failed": report.failed,
    })))
}

/// `POST /health/start`
pub async fn health_start(State(state): State<AppState>) -> impl IntoResponse {
    state.monitor.start().await;
    Json(json!({ "message": "Health check scheduler started" }))
}

/// `POST /health/stop`
pub async fn health_stop(State(state): State<AppState>) -> impl IntoResponse {
    state.monitor.stop();
    Json(json!({ "message": "Health check scheduler stopped" }))
}

/// `POST /health/run`
pub async fn health_run(State(state): State<AppState>) -> impl IntoResponse {
    state.monitor.run_once().await;
    Json(json!({ "message": "Health check round completed" }))
}
