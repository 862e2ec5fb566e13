//! Error types for the client session

use cohort_protocol::ErrorCode;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection dropped; drives reconnection and is never surfaced on its own
    #[error("transport lost: {0}")]
    TransportLost(String),

    #[error("connectivity exhausted after {attempts} reconnection attempts")]
    ConnectivityExhausted { attempts: u32 },

    #[error("rejected by server ({code}): {message}")]
    Rejected { code: ErrorCode, message: String },

    #[error("not connected")]
    NotConnected,

    #[error("session closed")]
    SessionClosed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    /// The server code of a typed refusal, if this is one
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        ClientError::Protocol(error.to_string())
    }
}
