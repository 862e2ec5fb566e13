//! Participant identity resolution.
//!
//! Sessions are issued elsewhere; the community channel only resolves a bearer
//! token into who is calling and whether they hold the admin capability.

use async_trait::async_trait;
use cohort_database::SessionRepository;
use cohort_protocol::ParticipantId;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;

use crate::types::{CommunityError, CommunityResult};

/// The authenticated caller of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub participant_id: ParticipantId,
    pub display_name: Option<String>,
    pub is_admin: bool,
}

impl Identity {
    pub fn participant(participant_id: ParticipantId) -> Self {
        Self { participant_id, display_name: None, is_admin: false }
    }

    pub fn admin(participant_id: ParticipantId) -> Self {
        Self { participant_id, display_name: None, is_admin: true }
    }
}

/// Resolves bearer tokens into identities
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fails with `Unauthenticated` for unknown or expired tokens
    async fn resolve(&self, token: &str) -> CommunityResult<Identity>;
}

/// Identity backed by the `sessions` table
pub struct SessionTableIdentity {
    sessions: SessionRepository,
}

impl SessionTableIdentity {
    pub fn new(pool: SqlitePool) -> Self {
        Self { sessions: SessionRepository::new(pool) }
    }
}

#[async_trait]
impl IdentityProvider for SessionTableIdentity {
    async fn resolve(&self, token: &str) -> CommunityResult<Identity> {
        let session = self
            .sessions
            .find_by_token(token)
            .await?
            .ok_or_else(|| CommunityError::unauthenticated("unknown session token"))?;

        if session.is_expired_at(chrono::Utc::now()) {
            debug!(participant_id = session.participant_id, "rejected expired session");
            return Err(CommunityError::unauthenticated("session expired"));
        }

        Ok(Identity {
            participant_id: session.participant_id,
            display_name: session.display_name,
            is_admin: session.is_admin,
        })
    }
}

/// Fixed token table for tests and local tooling
#[derive(Default, Clone)]
pub struct StaticIdentity {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn resolve(&self, token: &str) -> CommunityResult<Identity> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| CommunityError::unauthenticated("unknown token"))
    }
}
