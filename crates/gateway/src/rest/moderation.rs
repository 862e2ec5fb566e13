//! Moderation endpoints; all of them need the admin capability

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Extension, Json, Router,
};
use cohort_community::Identity;
use cohort_protocol::{ErrorBody, Membership, ParticipantId};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::state::GatewayState;

/// Create moderation routes
pub fn create_moderation_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/channels/:channel_key/members/:participant_id/mute", post(mute_member))
        .route("/api/channels/:channel_key/members/:participant_id/unmute", post(unmute_member))
        .route("/api/channels/:channel_key/members/:participant_id", delete(remove_member))
}

#[utoipa::path(
    post,
    path = "/api/channels/{channel_key}/members/{participant_id}/mute",
    tag = "Moderation",
    params(
        ("channel_key" = String, Path, description = "Channel key"),
        ("participant_id" = i64, Path, description = "Member to mute")
    ),
    responses(
        (status = 200, description = "Member is muted (idempotent)", body = Membership),
        (status = 403, description = "Admin capability required", body = ErrorBody),
        (status = 404, description = "Channel or member not found", body = ErrorBody)
    )
)]
pub async fn mute_member(
    Path((channel_key, participant_id)): Path<(String, ParticipantId)>,
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
) -> GatewayResult<Json<Membership>> {
    let membership = state.community.mute_member(&identity, &channel_key, participant_id).await?;
    Ok(Json(membership))
}

#[utoipa::path(
    post,
    path = "/api/channels/{channel_key}/members/{participant_id}/unmute",
    tag = "Moderation",
    params(
        ("channel_key" = String, Path, description = "Channel key"),
        ("participant_id" = i64, Path, description = "Member to unmute")
    ),
    responses(
        (status = 200, description = "Member may send again (idempotent)", body = Membership),
        (status = 403, description = "Admin capability required", body = ErrorBody),
        (status = 404, description = "Channel or member not found", body = ErrorBody)
    )
)]
pub async fn unmute_member(
    Path((channel_key, participant_id)): Path<(String, ParticipantId)>,
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
) -> GatewayResult<Json<Membership>> {
    let membership = state.community.unmute_member(&identity, &channel_key, participant_id).await?;
    Ok(Json(membership))
}

#[utoipa::path(
    delete,
    path = "/api/channels/{channel_key}/members/{participant_id}",
    tag = "Moderation",
    params(
        ("channel_key" = String, Path, description = "Channel key"),
        ("participant_id" = i64, Path, description = "Member to remove")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Admin capability required", body = ErrorBody),
        (status = 404, description = "Channel or member not found", body = ErrorBody)
    )
)]
pub async fn remove_member(
    Path((channel_key, participant_id)): Path<(String, ParticipantId)>,
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
) -> GatewayResult<StatusCode> {
    state.community.remove_member(&identity, &channel_key, participant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
