//! Channel setup and inspection endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use cohort_community::Identity;
use cohort_protocol::{ChannelInfo, CohortChannelStatus, CohortId, ErrorBody};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::state::GatewayState;

/// Create channel routes
pub fn create_channel_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/cohorts", get(list_cohorts))
        .route("/api/cohorts/:cohort_id/channel", post(create_channel))
        .route("/api/channels/:channel_key", get(get_channel))
}

#[utoipa::path(
    get,
    path = "/api/cohorts",
    tag = "Channels",
    responses(
        (status = 200, description = "Cohorts with their channel status", body = Vec<CohortChannelStatus>),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Admin capability required", body = ErrorBody)
    )
)]
pub async fn list_cohorts(
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
) -> GatewayResult<Json<Vec<CohortChannelStatus>>> {
    let statuses = state.community.list_cohorts_with_channel_status(&identity).await?;
    Ok(Json(statuses))
}

#[utoipa::path(
    post,
    path = "/api/cohorts/{cohort_id}/channel",
    tag = "Channels",
    params(
        ("cohort_id" = i64, Path, description = "Cohort ID")
    ),
    responses(
        (status = 201, description = "Channel created", body = ChannelInfo),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Admin capability required", body = ErrorBody),
        (status = 404, description = "Cohort not found", body = ErrorBody),
        (status = 409, description = "Channel already exists", body = ErrorBody)
    )
)]
pub async fn create_channel(
    Path(cohort_id): Path<CohortId>,
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
) -> GatewayResult<impl IntoResponse> {
    let info = state.community.create_channel(&identity, cohort_id).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

#[utoipa::path(
    get,
    path = "/api/channels/{channel_key}",
    tag = "Channels",
    params(
        ("channel_key" = String, Path, description = "Channel key, e.g. cohort-42")
    ),
    responses(
        (status = 200, description = "Channel details", body = ChannelInfo),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Channel not set up, or caller is not a member", body = ErrorBody)
    )
)]
pub async fn get_channel(
    Path(channel_key): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
) -> GatewayResult<Json<ChannelInfo>> {
    let info = state.community.get_channel_info(&identity, &channel_key).await?;
    Ok(Json(info))
}
