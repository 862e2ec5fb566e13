//! Session lookups for the identity provider.

use crate::entities::ParticipantSession;
use crate::types::DatabaseResult;
use sqlx::{Row, SqlitePool};

#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a session by token regardless of expiry
    pub async fn find_by_token(&self, token: &str) -> DatabaseResult<Option<ParticipantSession>> {
        let row = sqlx::query(
            "SELECT token, participant_id, display_name, is_admin, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ParticipantSession {
            token: row.try_get("token")?,
            participant_id: row.try_get("participant_id")?,
            display_name: row.try_get("display_name")?,
            is_admin: row.try_get("is_admin")?,
            expires_at: row.try_get("expires_at")?,
        }))
    }

    /// Insert or replace a session; used by seeding and tests
    pub async fn upsert(&self, session: &ParticipantSession) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO sessions (token, participant_id, display_name, is_admin, expires_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(token) DO UPDATE SET participant_id = excluded.participant_id,
                 display_name = excluded.display_name, is_admin = excluded.is_admin, expires_at = excluded.expires_at",
        )
        .bind(&session.token)
        .bind(session.participant_id)
        .bind(&session.display_name)
        .bind(session.is_admin)
        .bind(&session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
