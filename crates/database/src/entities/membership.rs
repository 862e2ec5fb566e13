use serde::{Deserialize, Serialize};

/// One (channel, participant) authorization record.
///
/// Absence of a row means no channel access; removal deletes the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMembership {
    pub id: i64,
    pub channel_id: i64,
    pub participant_id: i64,
    pub display_name: Option<String>,
    pub can_send: bool,
    /// Set while muted, cleared on unmute
    pub muted_at: Option<String>,
    pub joined_at: String,
}

impl ChannelMembership {
    pub fn is_muted(&self) -> bool {
        !self.can_send
    }
}

impl From<ChannelMembership> for cohort_protocol::Membership {
    fn from(membership: ChannelMembership) -> Self {
        Self {
            participant_id: membership.participant_id,
            display_name: membership.display_name,
            can_send: membership.can_send,
            muted_at: membership.muted_at,
            joined_at: membership.joined_at,
        }
    }
}
