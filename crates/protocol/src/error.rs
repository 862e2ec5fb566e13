//! Stable error codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error kinds surfaced to callers of the community channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Channel never created for this cohort; the "not set up yet" state
    ChannelNotFound,
    Forbidden,
    Muted,
    NotMember,
    ChannelExists,
    CohortNotFound,
    Validation,
    Unauthenticated,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ChannelNotFound => "CHANNEL_NOT_FOUND",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Muted => "MUTED",
            ErrorCode::NotMember => "NOT_MEMBER",
            ErrorCode::ChannelExists => "CHANNEL_EXISTS",
            ErrorCode::CohortNotFound => "COHORT_NOT_FOUND",
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Whether a UI should offer the "ask an admin to create it" path
    pub fn is_setup_required(&self) -> bool {
        matches!(self, ErrorCode::ChannelNotFound)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body of every failed REST call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ErrorBody {
    pub error: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub setup_required: bool,
}

impl ErrorBody {
    pub fn new(error: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            setup_required: error.is_setup_required(),
        }
    }
}
