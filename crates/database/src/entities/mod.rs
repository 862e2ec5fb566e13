//! Domain entities for the database layer

pub mod channel;
pub mod cohort;
pub mod membership;
pub mod message;
pub mod session;

pub use channel::{Channel, CreateChannelRequest, SeedMember};
pub use cohort::{Cohort, Enrollment};
pub use membership::ChannelMembership;
pub use message::ChannelMessage;
pub use session::ParticipantSession;
