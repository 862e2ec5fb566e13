//! Error types for the database layer

use thiserror::Error;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database query error: {0}")]
    QueryError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        DatabaseError::QueryError(error.to_string())
    }
}

/// Channel-specific database errors
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not found")]
    ChannelNotFound,

    #[error("Channel already exists")]
    ChannelAlreadyExists,

    #[error("Member not found")]
    NotMember,

    #[error("Member is muted")]
    Muted,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for ChannelError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                return ChannelError::ChannelAlreadyExists;
            }
        }
        ChannelError::DatabaseError(error.to_string())
    }
}
