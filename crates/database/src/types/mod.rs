//! Shared types and result types for the database layer

pub mod errors;

pub use errors::{ChannelError, DatabaseError};

pub type DatabaseResult<T> = Result<T, DatabaseError>;
pub type ChannelResult<T> = Result<T, ChannelError>;
