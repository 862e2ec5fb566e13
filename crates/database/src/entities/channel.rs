use serde::{Deserialize, Serialize};

/// A per-cohort community channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Database primary key
    pub id: i64,
    /// Stable key derived from the owning cohort; never changes
    pub key: String,
    pub cohort_id: i64,
    /// Sequence number of the newest message, 0 for an empty log
    pub last_seq: i64,
    pub created_by: i64,
    pub created_at: String,
}

/// Membership row created together with a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedMember {
    pub participant_id: i64,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub key: String,
    pub cohort_id: i64,
    pub created_by: i64,
    pub members: Vec<SeedMember>,
}
