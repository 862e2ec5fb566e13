//! Channel, membership and message shapes exchanged over REST and WebSocket.

use serde::{Deserialize, Serialize};

use crate::{CohortId, ParticipantId};

/// Derive the stable channel key owned by a cohort.
///
/// ```
/// assert_eq!(cohort_protocol::channel_key_for_cohort(42), "cohort-42");
/// ```
pub fn channel_key_for_cohort(cohort_id: CohortId) -> String {
    format!("cohort-{cohort_id}")
}

/// A committed chat message. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Message {
    pub channel_key: String,
    /// Gap-free, strictly increasing within a channel; starts at 1
    pub seq: i64,
    pub sender_id: ParticipantId,
    pub text: String,
    pub created_at: String,
}

/// A participant's authorization record within a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Membership {
    pub participant_id: ParticipantId,
    pub display_name: Option<String>,
    pub can_send: bool,
    pub muted_at: Option<String>,
    pub joined_at: String,
}

impl Membership {
    pub fn is_muted(&self) -> bool {
        !self.can_send
    }
}

/// Response body of `getChannelInfo`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChannelInfo {
    pub key: String,
    pub cohort_id: CohortId,
    pub last_seq: i64,
    pub created_at: String,
    pub members: Vec<Membership>,
    /// Participants with at least one live joined connection
    pub online: Vec<ParticipantId>,
}

/// One page of history, most recent first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MessagePage {
    pub channel_key: String,
    pub limit: i64,
    pub offset: i64,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendMessageRequest {
    pub text: String,
}

/// Entry of `listCohortsWithChannelStatus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CohortChannelStatus {
    pub cohort_id: CohortId,
    pub name: String,
    pub channel_key: Option<String>,
    pub has_channel: bool,
}
