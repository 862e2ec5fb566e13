use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An externally issued participant session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSession {
    pub token: String,
    pub participant_id: i64,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub expires_at: String,
}

impl ParticipantSession {
    /// Unparseable expiry timestamps count as expired
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires_at) => expires_at.with_timezone(&Utc) <= now,
            Err(_) => true,
        }
    }
}
