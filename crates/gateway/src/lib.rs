//! # Cohort Gateway Crate
//!
//! HTTP REST and WebSocket surface of the community channel. Routes resolve
//! the caller through the configured identity provider and hand off to
//! [`cohort_community::Community`].
//!
//! ## Architecture
//!
//! - **REST**: request/response operations with OpenAPI documentation
//! - **WebSocket**: `/ws/community`, the connection-scoped event stream
//! - **State**: shared services handed to every handler
//! - **Middleware**: authentication and request logging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cohort_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::new(community, identity, config.community.outbound_queue);
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use middleware::auth_middleware;
pub use state::GatewayState;

use axum::{
    http::{header, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);

    #[allow(unused_mut)]
    let mut router = Router::new()
        // Liveness
        .route("/health", get(rest::health::health_check))
        // REST API routes, all authenticated
        .merge(
            rest::create_rest_routes()
                .route_layer(axum_middleware::from_fn_with_state(arc_state.clone(), auth_middleware))
                .with_state(arc_state.clone()),
        )
        // WebSocket routes authenticate during the upgrade
        .merge(websocket::create_websocket_routes().with_state(arc_state))
        // CORS middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]),
        )
        // Logging middleware
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    // Add Swagger UI if in debug mode
    #[cfg(debug_assertions)]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            paths(
                rest::health::health_check,
                rest::channel::list_cohorts,
                rest::channel::create_channel,
                rest::channel::get_channel,
                rest::message::list_messages,
                rest::message::create_message,
                rest::moderation::mute_member,
                rest::moderation::unmute_member,
                rest::moderation::remove_member,
            ),
            components(
                schemas(
                    rest::health::HealthResponse,
                    rest::message::ListMessagesQuery,
                    cohort_protocol::ChannelInfo,
                    cohort_protocol::CohortChannelStatus,
                    cohort_protocol::Membership,
                    cohort_protocol::Message,
                    cohort_protocol::MessagePage,
                    cohort_protocol::SendMessageRequest,
                    cohort_protocol::ErrorBody,
                    cohort_protocol::ErrorCode,
                )
            ),
            tags(
                (name = "Health", description = "Liveness"),
                (name = "Channels", description = "Channel setup and inspection"),
                (name = "Messages", description = "Channel message log"),
                (name = "Moderation", description = "Mute, unmute and removal of members"),
            )
        )]
        struct ApiDoc;

        router = router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
}
