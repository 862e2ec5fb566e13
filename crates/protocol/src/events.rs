//! WebSocket vocabulary for the community channel.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::model::{Membership, Message};
use crate::ParticipantId;

/// Commands a client sends over its connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Heartbeat to keep connection alive
    Ping,
    /// Register presence and start receiving channel events
    Join { channel_key: String },
    /// Drop presence and stop receiving channel events
    Leave { channel_key: String },
    /// Start or refresh a typing signal
    Typing { channel_key: String },
    /// Clear a typing signal
    StopTyping { channel_key: String },
}

impl ClientCommand {
    pub fn channel_key(&self) -> Option<&str> {
        match self {
            ClientCommand::Ping => None,
            ClientCommand::Join { channel_key }
            | ClientCommand::Leave { channel_key }
            | ClientCommand::Typing { channel_key }
            | ClientCommand::StopTyping { channel_key } => Some(channel_key),
        }
    }
}

/// Connection-scoped frames addressed to one connection only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Handshake completed
    Hello {
        connection_id: String,
        participant_id: ParticipantId,
    },
    /// Heartbeat response
    Pong,
    /// Join acknowledgement
    Joined {
        channel_key: String,
        last_seq: i64,
        online: Vec<ParticipantId>,
    },
    /// Leave acknowledgement
    Left { channel_key: String },
    /// A command was refused
    Error {
        code: ErrorCode,
        message: String,
        channel_key: Option<String>,
    },
}

/// Events fanned out to every connection joined to a channel, in commit order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    MessageAppended {
        message: Message,
    },
    ParticipantJoined {
        channel_key: String,
        participant_id: ParticipantId,
        online: usize,
    },
    ParticipantLeft {
        channel_key: String,
        participant_id: ParticipantId,
        online: usize,
    },
    TypingStarted {
        channel_key: String,
        participant_id: ParticipantId,
    },
    TypingStopped {
        channel_key: String,
        participant_id: ParticipantId,
    },
    /// A mute or unmute committed
    MemberUpdated {
        channel_key: String,
        membership: Membership,
    },
    /// A membership row was deleted by a moderator
    MemberRemoved {
        channel_key: String,
        participant_id: ParticipantId,
    },
}

impl ChannelEvent {
    pub fn channel_key(&self) -> &str {
        match self {
            ChannelEvent::MessageAppended { message } => &message.channel_key,
            ChannelEvent::ParticipantJoined { channel_key, .. }
            | ChannelEvent::ParticipantLeft { channel_key, .. }
            | ChannelEvent::TypingStarted { channel_key, .. }
            | ChannelEvent::TypingStopped { channel_key, .. }
            | ChannelEvent::MemberUpdated { channel_key, .. }
            | ChannelEvent::MemberRemoved { channel_key, .. } => channel_key,
        }
    }

    /// True when this event revokes `participant_id`'s access to the channel
    pub fn removes(&self, participant_id: ParticipantId) -> bool {
        matches!(self, ChannelEvent::MemberRemoved { participant_id: removed, .. } if *removed == participant_id)
    }
}

/// Everything the server writes to a connection.
///
/// Variant tags of the two inner enums are disjoint, so the untagged
/// representation round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Control(ControlFrame),
    Channel(ChannelEvent),
}

impl From<ControlFrame> for ServerFrame {
    fn from(frame: ControlFrame) -> Self {
        ServerFrame::Control(frame)
    }
}

impl From<ChannelEvent> for ServerFrame {
    fn from(event: ChannelEvent) -> Self {
        ServerFrame::Channel(event)
    }
}
