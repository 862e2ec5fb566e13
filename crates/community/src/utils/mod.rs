//! Internal utilities for the community channel.

pub mod keyed_lock;
pub mod permissions;
pub mod validation;

pub use keyed_lock::KeyedLocks;
pub use permissions::PermissionChecker;
pub use validation::Validator;
