//! REST API endpoints for the gateway

pub mod channel;
pub mod health;
pub mod message;
pub mod moderation;

use axum::Router;
use crate::state::GatewayState;
use std::sync::Arc;

/// Create all authenticated REST API routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        // Channel setup and inspection
        .merge(channel::create_channel_routes())
        // Message log
        .merge(message::create_message_routes())
        // Moderation
        .merge(moderation::create_moderation_routes())
}
