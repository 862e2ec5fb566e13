//! Error types for the community channel.

use cohort_database::{ChannelError, DatabaseError};
use cohort_protocol::ErrorCode;
use thiserror::Error;

/// Result type alias for community operations
pub type CommunityResult<T> = Result<T, CommunityError>;

/// Main error type for the community channel
#[derive(Debug, Error)]
pub enum CommunityError {
    #[error("Channel not found: {key}")]
    ChannelNotFound { key: String },

    #[error("Cohort not found: {id}")]
    CohortNotFound { id: i64 },

    #[error("Channel already exists: {key}")]
    ChannelExists { key: String },

    #[error("Not a member of channel {key}")]
    NotMember { key: String },

    #[error("Muted in channel {key}")]
    Muted { key: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unauthenticated: {reason}")]
    Unauthenticated { reason: String },

    #[error("Database error: {message}")]
    Database { message: String },
}

impl CommunityError {
    pub fn channel_not_found(key: impl Into<String>) -> Self {
        Self::ChannelNotFound { key: key.into() }
    }

    pub fn not_member(key: impl Into<String>) -> Self {
        Self::NotMember { key: key.into() }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden { reason: reason.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated { reason: reason.into() }
    }

    /// Lift a repository error, attaching the channel key it concerned
    pub fn from_channel(error: ChannelError, key: &str) -> Self {
        match error {
            ChannelError::ChannelNotFound => Self::channel_not_found(key),
            ChannelError::ChannelAlreadyExists => Self::ChannelExists { key: key.to_string() },
            ChannelError::NotMember => Self::not_member(key),
            ChannelError::Muted => Self::Muted { key: key.to_string() },
            ChannelError::DatabaseError(message) => Self::Database { message },
        }
    }

    /// Stable code surfaced to REST bodies and WebSocket error frames
    pub fn code(&self) -> ErrorCode {
        match self {
            CommunityError::ChannelNotFound { .. } => ErrorCode::ChannelNotFound,
            CommunityError::CohortNotFound { .. } => ErrorCode::CohortNotFound,
            CommunityError::ChannelExists { .. } => ErrorCode::ChannelExists,
            CommunityError::NotMember { .. } => ErrorCode::NotMember,
            CommunityError::Muted { .. } => ErrorCode::Muted,
            CommunityError::Forbidden { .. } => ErrorCode::Forbidden,
            CommunityError::Validation { .. } => ErrorCode::Validation,
            CommunityError::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            CommunityError::Database { .. } => ErrorCode::Internal,
        }
    }
}

impl From<DatabaseError> for CommunityError {
    fn from(error: DatabaseError) -> Self {
        Self::Database { message: error.to_string() }
    }
}
