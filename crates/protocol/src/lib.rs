//! # Cohort Protocol Crate
//!
//! Wire-level types shared by the community server (`cohort-gateway`) and the
//! client connection session (`cohort-client`). Everything in here is plain
//! serde data: no I/O, no runtime.
//!
//! - **Model**: persisted shapes as they travel over the wire (`Message`, `Membership`, ...)
//! - **Events**: the WebSocket vocabulary (`ClientCommand`, `ServerFrame`, `ChannelEvent`)
//! - **Errors**: stable error codes shared by REST bodies and WebSocket error frames

pub mod error;
pub mod events;
pub mod model;

pub use error::{ErrorBody, ErrorCode};
pub use events::{ChannelEvent, ClientCommand, ControlFrame, ServerFrame};
pub use model::{
    channel_key_for_cohort, ChannelInfo, CohortChannelStatus, Membership, Message, MessagePage,
    SendMessageRequest,
};

/// Identity of a participant as supplied by the identity provider
pub type ParticipantId = i64;
/// Identity of a cohort as supplied by the cohort registry
pub type CohortId = i64;
