//! Cohort Database Crate
//!
//! Persistence for community channels: connection management, embedded
//! migrations, and repositories for channels, memberships, the message log,
//! the cohort registry tables and externally issued sessions.

use cohort_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

pub use repos::{
    ChannelRepository, CohortRepository, MembershipRepository, MembershipUpdate, MessageRepository,
    SessionRepository,
};

pub use entities::{
    Channel, ChannelMembership, ChannelMessage, Cohort, CreateChannelRequest, Enrollment,
    ParticipantSession, SeedMember,
};

pub use types::{ChannelError, ChannelResult, DatabaseError, DatabaseResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fresh migrated in-memory database
    pub async fn memory_pool() -> SqlitePool {
        initialize_database(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
        .expect("in-memory database")
    }
}
