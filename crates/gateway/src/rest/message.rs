//! Message REST endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use cohort_community::Identity;
use cohort_protocol::{ErrorBody, Message, MessagePage, SendMessageRequest};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::GatewayResult;
use crate::state::GatewayState;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Create message routes
pub fn create_message_routes() -> Router<Arc<GatewayState>> {
    Router::new().route(
        "/api/channels/:channel_key/messages",
        get(list_messages).post(create_message),
    )
}

#[utoipa::path(
    get,
    path = "/api/channels/{channel_key}/messages",
    tag = "Messages",
    params(
        ("channel_key" = String, Path, description = "Channel key"),
        ListMessagesQuery
    ),
    responses(
        (status = 200, description = "Page of messages, most recent first", body = MessagePage),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Channel not set up, or caller is not a member", body = ErrorBody)
    )
)]
pub async fn list_messages(
    Path(channel_key): Path<String>,
    Query(params): Query<ListMessagesQuery>,
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
) -> GatewayResult<Json<MessagePage>> {
    let page = state
        .community
        .get_messages(&identity, &channel_key, params.limit, params.offset)
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/channels/{channel_key}/messages",
    tag = "Messages",
    params(
        ("channel_key" = String, Path, description = "Channel key")
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message appended", body = Message),
        (status = 400, description = "Empty or oversized text", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Sender is muted", body = ErrorBody),
        (status = 404, description = "Channel not set up, or sender is not a member", body = ErrorBody)
    )
)]
pub async fn create_message(
    Path(channel_key): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<SendMessageRequest>,
) -> GatewayResult<impl IntoResponse> {
    let message = state.community.send_message(&identity, &channel_key, &payload.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
