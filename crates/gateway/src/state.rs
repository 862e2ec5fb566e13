//! Shared application state for the gateway

use cohort_community::{Community, IdentityProvider};
use std::sync::Arc;

/// Shared application state containing all services
#[derive(Clone)]
pub struct GatewayState {
    /// Community channel services
    pub community: Arc<Community>,
    /// Resolves bearer tokens into caller identities
    pub identity: Arc<dyn IdentityProvider>,
    /// Outbound frame queue per WebSocket connection
    pub outbound_queue: usize,
}

impl GatewayState {
    pub fn new(community: Arc<Community>, identity: Arc<dyn IdentityProvider>, outbound_queue: usize) -> Self {
        Self { community, identity, outbound_queue: outbound_queue.max(1) }
    }
}
