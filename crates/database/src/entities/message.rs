use serde::{Deserialize, Serialize};

/// An appended chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub id: i64,
    pub channel_id: i64,
    pub channel_key: String,
    pub seq: i64,
    pub sender_id: i64,
    pub body: String,
    pub created_at: String,
}

impl From<ChannelMessage> for cohort_protocol::Message {
    fn from(message: ChannelMessage) -> Self {
        Self {
            channel_key: message.channel_key,
            seq: message.seq,
            sender_id: message.sender_id,
            text: message.body,
            created_at: message.created_at,
        }
    }
}
