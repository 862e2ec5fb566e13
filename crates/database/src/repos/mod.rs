//! Database repository implementations

pub mod channel_repository;
pub mod cohort_repository;
pub mod membership_repository;
pub mod message_repository;
pub mod session_repository;

pub use channel_repository::ChannelRepository;
pub use cohort_repository::CohortRepository;
pub use membership_repository::{MembershipRepository, MembershipUpdate};
pub use message_repository::MessageRepository;
pub use session_repository::SessionRepository;
