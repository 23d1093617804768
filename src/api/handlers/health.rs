use crate::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse),
        (status = 503, description = "Database or upload directory unavailable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db.ping().await.is_ok();
    let storage_ok = tokio::fs::metadata(state.storage.root())
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let status = if db_ok && storage_ok {
        StatusCode::OK
    } else {
        tracing::warn!(db_ok, storage_ok, "Health check degraded");
        StatusCode::SERVICE_UNAVAILABLE
    };

    let label = |ok: bool| if ok { "connected" } else { "unavailable" }.to_string();

    (
        status,
        Json(HealthResponse {
            status: if status.is_success() { "ok" } else { "degraded" }.to_string(),
            database: label(db_ok),
            storage: label(storage_ok),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
