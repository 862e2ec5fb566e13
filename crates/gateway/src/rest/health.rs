//! Liveness endpoint; answers without a session token

use axum::Json;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

const SERVICE: &str = "cohort-community";

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// RFC 3339
    pub checked_at: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Community channel server is up", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checked_at: Utc::now().to_rfc3339(),
    })
}
