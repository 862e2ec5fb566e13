//! Read access to the cohort registry tables.
//!
//! Cohort and enrollment CRUD belongs to the external registry service; the
//! write helpers here exist for seeding and tests.

use crate::entities::{Cohort, Enrollment};
use crate::types::DatabaseResult;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

fn cohort_from_row(row: &SqliteRow) -> Result<Cohort, sqlx::Error> {
    Ok(Cohort {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Clone)]
pub struct CohortRepository {
    pool: SqlitePool,
}

impl CohortRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, cohort_id: i64) -> DatabaseResult<Option<Cohort>> {
        let row = sqlx::query("SELECT id, name, created_at FROM cohorts WHERE id = ?")
            .bind(cohort_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(cohort_from_row).transpose()?)
    }

    pub async fn list(&self) -> DatabaseResult<Vec<Cohort>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM cohorts ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(cohort_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn enrollments(&self, cohort_id: i64) -> DatabaseResult<Vec<Enrollment>> {
        let rows = sqlx::query(
            "SELECT cohort_id, participant_id, display_name FROM cohort_enrollments
             WHERE cohort_id = ? ORDER BY participant_id ASC",
        )
        .bind(cohort_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Enrollment {
                    cohort_id: row.try_get("cohort_id")?,
                    participant_id: row.try_get("participant_id")?,
                    display_name: row.try_get("display_name")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(Into::into)
    }

    pub async fn create(&self, name: &str) -> DatabaseResult<Cohort> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query("INSERT INTO cohorts (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        Ok(Cohort {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            created_at: now,
        })
    }

    pub async fn enroll(&self, cohort_id: i64, participant_id: i64, display_name: Option<&str>) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO cohort_enrollments (cohort_id, participant_id, display_name) VALUES (?, ?, ?)
             ON CONFLICT(cohort_id, participant_id) DO UPDATE SET display_name = excluded.display_name",
        )
        .bind(cohort_id)
        .bind(participant_id)
        .bind(display_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
