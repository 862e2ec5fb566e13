//! Repository for channel membership rows.

use crate::entities::ChannelMembership;
use crate::types::{ChannelError, ChannelResult};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

const MEMBERSHIP_COLUMNS: &str =
    "id, channel_id, participant_id, display_name, can_send, muted_at, joined_at";

fn membership_from_row(row: &SqliteRow) -> Result<ChannelMembership, sqlx::Error> {
    Ok(ChannelMembership {
        id: row.try_get("id")?,
        channel_id: row.try_get("channel_id")?,
        participant_id: row.try_get("participant_id")?,
        display_name: row.try_get("display_name")?,
        can_send: row.try_get("can_send")?,
        muted_at: row.try_get("muted_at")?,
        joined_at: row.try_get("joined_at")?,
    })
}

/// Outcome of a mute/unmute write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipUpdate {
    pub membership: ChannelMembership,
    /// False when the row already had the requested state
    pub changed: bool,
}

/// Repository for membership database operations
#[derive(Clone)]
pub struct MembershipRepository {
    pool: SqlitePool,
}

impl MembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All memberships of a channel, oldest first
    pub async fn list_by_channel(&self, channel_id: i64) -> ChannelResult<Vec<ChannelMembership>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM channel_memberships WHERE channel_id = ? ORDER BY joined_at ASC, id ASC"
        ))
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(membership_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn find(&self, channel_id: i64, participant_id: i64) -> ChannelResult<Option<ChannelMembership>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM channel_memberships WHERE channel_id = ? AND participant_id = ?"
        ))
        .bind(channel_id)
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(membership_from_row).transpose()?)
    }

    /// Set the `can_send` flag. Idempotent: writing the current state reports `changed: false`.
    pub async fn set_can_send(
        &self,
        channel_id: i64,
        participant_id: i64,
        can_send: bool,
    ) -> ChannelResult<MembershipUpdate> {
        let current = self
            .find(channel_id, participant_id)
            .await?
            .ok_or(ChannelError::NotMember)?;

        if current.can_send == can_send {
            return Ok(MembershipUpdate { membership: current, changed: false });
        }

        let muted_at = (!can_send).then(|| chrono::Utc::now().to_rfc3339());

        let result = sqlx::query(
            "UPDATE channel_memberships SET can_send = ?, muted_at = ? WHERE channel_id = ? AND participant_id = ?",
        )
        .bind(can_send)
        .bind(&muted_at)
        .bind(channel_id)
        .bind(participant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ChannelError::NotMember);
        }

        info!(channel_id, participant_id, can_send, "updated membership send flag");

        Ok(MembershipUpdate {
            membership: ChannelMembership { can_send, muted_at, ..current },
            changed: true,
        })
    }

    /// Hard-delete a membership row
    pub async fn delete(&self, channel_id: i64, participant_id: i64) -> ChannelResult<()> {
        let result = sqlx::query("DELETE FROM channel_memberships WHERE channel_id = ? AND participant_id = ?")
            .bind(channel_id)
            .bind(participant_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ChannelError::NotMember);
        }

        info!(channel_id, participant_id, "removed member from channel");
        Ok(())
    }
}
