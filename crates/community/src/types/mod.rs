//! Shared types for the community channel

pub mod errors;

pub use errors::{CommunityError, CommunityResult};

/// Identifies one live connection; a participant may hold several
pub type ConnectionId = uuid::Uuid;
