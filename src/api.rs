use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{ExportError, RegistryError};
use crate::export::{self, ExportFormat};
use crate::models::{MonitorRecord, ResultSnapshot};
use crate::registry::Registry;

type AppState = Arc<Registry>;

pub enum ApiError {
    NotFound(String),
    Invalid(RegistryError),
    Export(ExportError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(address) => (StatusCode::NOT_FOUND, format!("no monitor for {}", address)),
            ApiError::Invalid(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Export(ExportError::NoResults) => (StatusCode::NOT_FOUND, ExportError::NoResults.to_string()),
            ApiError::Export(e @ ExportError::UnsupportedFormat(_)) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Export(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

async fn get_snapshot(State(registry): State<AppState>) -> Json<ResultSnapshot> {
    Json(registry.snapshot())
}

async fn list_monitors(State(registry): State<AppState>) -> Json<Vec<MonitorRecord>> {
    Json(registry.records())
}

async fn get_monitor(
    State(registry): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<MonitorRecord>, ApiError> {
    registry.get(&address).map(Json).ok_or(ApiError::NotFound(address))
}

async fn register_monitor(
    State(registry): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MonitorRecord>), ApiError> {
    let created = registry.register(&req.address, req.label.as_deref()).map_err(ApiError::Invalid)?;
    let address = req.address.trim().to_string();
    let record = registry.get(&address).ok_or(ApiError::NotFound(address))?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(record)))
}

async fn delete_monitor(State(registry): State<AppState>, Path(address): Path<String>) -> StatusCode {
    registry.unregister(&address);
    StatusCode::NO_CONTENT
}

async fn start_monitor(State(registry): State<AppState>, Path(address): Path<String>) -> Result<StatusCode, ApiError> {
    if !registry.contains(&address) {
        return Err(ApiError::NotFound(address));
    }
    registry.start(&address);
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_monitor(State(registry): State<AppState>, Path(address): Path<String>) -> Result<StatusCode, ApiError> {
    if !registry.contains(&address) {
        return Err(ApiError::NotFound(address));
    }
    registry.stop(&address);
    Ok(StatusCode::NO_CONTENT)
}

async fn start_all(State(registry): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "started": registry.start_all() }))
}

async fn stop_all(State(registry): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "stopped": registry.stop_all() }))
}

async fn export_results(
    State(registry): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = match query.format.as_deref() {
        Some(name) => ExportFormat::from_name(name).map_err(ApiError::Export)?,
        None => ExportFormat::Csv,
    };
    let body = export::render(&registry.snapshot(), format).map_err(ApiError::Export)?;
    let content_type = match format {
        ExportFormat::Csv => "text/csv; charset=utf-8",
        ExportFormat::Json => "application/json",
    };
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

pub fn create_router(registry: AppState) -> Router {
    Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/monitors", get(list_monitors).post(register_monitor))
        .route("/api/monitors/{address}", get(get_monitor).delete(delete_monitor))
        .route("/api/monitors/{address}/start", post(start_monitor))
        .route("/api/monitors/{address}/stop", post(stop_monitor))
        .route("/api/start-all", post(start_all))
        .route("/api/stop-all", post(stop_all))
        .route("/api/export", get(export_results))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

pub async fn start_server(port: u16, registry: AppState) -> anyhow::Result<()> {
    let app = create_router(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Control API: http://localhost:{}/api/snapshot", addr.port());
    axum::serve(listener, app).await?;
    Ok(())
}
