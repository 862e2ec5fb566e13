//! Repository for channel data access operations.

use crate::entities::{Channel, CreateChannelRequest};
use crate::types::{ChannelError, ChannelResult};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

const CHANNEL_COLUMNS: &str = "id, key, cohort_id, last_seq, created_by, created_at";

pub(crate) fn channel_from_row(row: &SqliteRow) -> Result<Channel, sqlx::Error> {
    Ok(Channel {
        id: row.try_get("id")?,
        key: row.try_get("key")?,
        cohort_id: row.try_get("cohort_id")?,
        last_seq: row.try_get("last_seq")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Repository for channel database operations
#[derive(Clone)]
pub struct ChannelRepository {
    pool: SqlitePool,
}

impl ChannelRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a channel by its stable key
    pub async fn find_by_key(&self, key: &str) -> ChannelResult<Option<Channel>> {
        let row = sqlx::query(&format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE key = ?"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(channel_from_row).transpose()?)
    }

    /// Same as [`find_by_key`](Self::find_by_key) but absence is an error
    pub async fn get_by_key(&self, key: &str) -> ChannelResult<Channel> {
        self.find_by_key(key).await?.ok_or(ChannelError::ChannelNotFound)
    }

    pub async fn find_by_cohort(&self, cohort_id: i64) -> ChannelResult<Option<Channel>> {
        let row = sqlx::query(&format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE cohort_id = ?"))
            .bind(cohort_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(channel_from_row).transpose()?)
    }

    pub async fn list(&self) -> ChannelResult<Vec<Channel>> {
        let rows = sqlx::query(&format!("SELECT {CHANNEL_COLUMNS} FROM channels ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(channel_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Create a channel and its seed memberships in one transaction.
    ///
    /// The `UNIQUE` constraints on `key` and `cohort_id` make a second create
    /// for the same cohort fail with [`ChannelError::ChannelAlreadyExists`],
    /// even when two admins race.
    pub async fn create(&self, request: &CreateChannelRequest) -> ChannelResult<Channel> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO channels (key, cohort_id, last_seq, created_by, created_at) VALUES (?, ?, 0, ?, ?)",
        )
        .bind(&request.key)
        .bind(request.cohort_id)
        .bind(request.created_by)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let channel_id = result.last_insert_rowid();

        for member in &request.members {
            sqlx::query(
                "INSERT OR IGNORE INTO channel_memberships (channel_id, participant_id, display_name, can_send, muted_at, joined_at)
                 VALUES (?, ?, ?, 1, NULL, ?)",
            )
            .bind(channel_id)
            .bind(member.participant_id)
            .bind(&member.display_name)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            channel_id,
            key = %request.key,
            cohort_id = request.cohort_id,
            members = request.members.len(),
            "created channel"
        );

        Ok(Channel {
            id: channel_id,
            key: request.key.clone(),
            cohort_id: request.cohort_id,
            last_seq: 0,
            created_by: request.created_by,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::SeedMember;
    use crate::test_support::memory_pool;

    fn request(cohort_id: i64) -> CreateChannelRequest {
        CreateChannelRequest {
            key: format!("cohort-{cohort_id}"),
            cohort_id,
            created_by: 1,
            members: vec![
                SeedMember { participant_id: 1, display_name: Some("Ada".into()) },
                SeedMember { participant_id: 2, display_name: None },
                SeedMember { participant_id: 2, display_name: None },
            ],
        }
    }

    #[tokio::test]
    async fn test_create_and_find_channel() {
        let pool = memory_pool().await;
        let repo = ChannelRepository::new(pool.clone());

        let channel = repo.create(&request(7)).await.unwrap();
        assert_eq!(channel.key, "cohort-7");
        assert_eq!(channel.last_seq, 0);

        let found = repo.find_by_key("cohort-7").await.unwrap().unwrap();
        assert_eq!(found, channel);
        assert_eq!(repo.find_by_cohort(7).await.unwrap().unwrap().id, channel.id);

        let members: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM channel_memberships WHERE channel_id = ?")
            .bind(channel.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(members.0, 2, "duplicate seed rows collapse into one membership");
    }

    #[tokio::test]
    async fn test_channel_created_at_most_once_per_cohort() {
        let pool = memory_pool().await;
        let repo = ChannelRepository::new(pool);

        repo.create(&request(3)).await.unwrap();
        let err = repo.create(&request(3)).await.unwrap_err();
        assert!(matches!(err, ChannelError::ChannelAlreadyExists));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_channel() {
        let pool = memory_pool().await;
        let repo = ChannelRepository::new(pool);

        assert!(repo.find_by_key("cohort-404").await.unwrap().is_none());
        assert!(matches!(
            repo.get_by_key("cohort-404").await.unwrap_err(),
            ChannelError::ChannelNotFound
        ));
    }
}
