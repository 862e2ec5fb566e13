//! Repository for the append-only channel message log.

use crate::entities::ChannelMessage;
use crate::types::{ChannelError, ChannelResult};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

fn message_from_row(row: &SqliteRow) -> Result<ChannelMessage, sqlx::Error> {
    Ok(ChannelMessage {
        id: row.try_get("id")?,
        channel_id: row.try_get("channel_id")?,
        channel_key: row.try_get("channel_key")?,
        seq: row.try_get("seq")?,
        sender_id: row.try_get("sender_id")?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message after checking the sender's membership, all in one transaction.
    ///
    /// The first statement bumps `channels.last_seq`, which takes SQLite's write
    /// lock before anything is read. The authorization check therefore observes
    /// every mute committed before this append began, and a rejected append rolls
    /// the sequence bump back so numbering stays gap-free.
    ///
    /// Callers serialize appends per channel; this method does not.
    pub async fn append(&self, channel_key: &str, sender_id: i64, body: &str) -> ChannelResult<ChannelMessage> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query("UPDATE channels SET last_seq = last_seq + 1 WHERE key = ? RETURNING id, last_seq")
            .bind(channel_key)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Err(ChannelError::ChannelNotFound);
        };

        let channel_id: i64 = row.try_get("id")?;
        let seq: i64 = row.try_get("last_seq")?;

        let can_send: Option<bool> = sqlx::query_scalar(
            "SELECT can_send FROM channel_memberships WHERE channel_id = ? AND participant_id = ?",
        )
        .bind(channel_id)
        .bind(sender_id)
        .fetch_optional(&mut *tx)
        .await?;

        match can_send {
            None => {
                tx.rollback().await?;
                debug!(channel_key, sender_id, "append rejected: not a member");
                return Err(ChannelError::NotMember);
            }
            Some(false) => {
                tx.rollback().await?;
                debug!(channel_key, sender_id, "append rejected: muted");
                return Err(ChannelError::Muted);
            }
            Some(true) => {}
        }

        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO channel_messages (channel_id, seq, sender_id, body, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(channel_id)
        .bind(seq)
        .bind(sender_id)
        .bind(body)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| ChannelError::DatabaseError(e.to_string()))?;

        tx.commit().await?;

        info!(channel_key, seq, sender_id, "message appended");

        Ok(ChannelMessage {
            id: result.last_insert_rowid(),
            channel_id,
            channel_key: channel_key.to_string(),
            seq,
            sender_id,
            body: body.to_string(),
            created_at: now,
        })
    }

    /// One page of history, most recent first
    pub async fn page(&self, channel_id: i64, limit: i64, offset: i64) -> ChannelResult<Vec<ChannelMessage>> {
        let rows = sqlx::query(
            "SELECT m.id, m.channel_id, c.key AS channel_key, m.seq, m.sender_id, m.body, m.created_at
             FROM channel_messages m JOIN channels c ON c.id = m.channel_id
             WHERE m.channel_id = ? ORDER BY m.seq DESC LIMIT ? OFFSET ?",
        )
        .bind(channel_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(message_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn count(&self, channel_id: i64) -> ChannelResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channel_messages WHERE channel_id = ?")
            .bind(channel_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
