//! # Cohort Community Crate
//!
//! The real-time community channel of a cohort: a durable, gap-free message
//! log per channel, server-enforced moderation, and the volatile presence and
//! typing state of live connections, fanned out to every joined connection in
//! commit order.
//!
//! ## Architecture
//!
//! - **Services**: channel store, moderation authority, presence tracker,
//!   typing coordinator, broadcast router, and the [`Community`] facade
//! - **Identity / Registry**: seams to the external session issuer and cohort registry
//! - **Types**: error taxonomy and shared aliases
//! - **Utils**: validation, permission checks and keyed locks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cohort_community::{Community, Identity, SqliteCohortRegistry};
//!
//! let community = Community::new(pool.clone(), Arc::new(SqliteCohortRegistry::new(pool)), config);
//! let message = community.send_message(&Identity::participant(7), "cohort-1", "hi").await?;
//! ```

pub mod identity;
pub mod registry;
pub mod services;
pub mod types;
pub mod utils;

pub use identity::{Identity, IdentityProvider, SessionTableIdentity, StaticIdentity};
pub use registry::{CohortRegistry, CohortSummary, SqliteCohortRegistry};
pub use services::{
    BroadcastRouter, ChannelStore, Community, JoinedChannel, ModerationAuthority, PresenceTracker,
    TypingCoordinator,
};
pub use types::{CommunityError, CommunityResult, ConnectionId};
