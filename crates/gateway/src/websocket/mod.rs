//! WebSocket endpoints for the gateway

pub mod community;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::GatewayState;

/// Create all WebSocket routes
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws/community", get(community::community_websocket_handler))
}

pub use community::community_websocket_handler;
