//! Business logic layer for the community channel.

pub mod broadcast;
pub mod channel_store;
pub mod community;
pub mod moderation;
pub mod presence;
pub mod typing;

pub use broadcast::BroadcastRouter;
pub use channel_store::ChannelStore;
pub use community::{Community, JoinedChannel};
pub use moderation::ModerationAuthority;
pub use presence::PresenceTracker;
pub use typing::TypingCoordinator;
