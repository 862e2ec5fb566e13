//! Cohort registry lookups.
//!
//! Cohorts and enrollments are owned by the registry; the channel only reads
//! them to validate `createChannel` and to seed memberships.

use async_trait::async_trait;
use cohort_database::{CohortRepository, SeedMember};
use cohort_protocol::CohortId;
use sqlx::SqlitePool;

use crate::types::CommunityResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortSummary {
    pub id: CohortId,
    pub name: String,
}

#[async_trait]
pub trait CohortRegistry: Send + Sync {
    async fn cohort(&self, cohort_id: CohortId) -> CommunityResult<Option<CohortSummary>>;

    async fn list_cohorts(&self) -> CommunityResult<Vec<CohortSummary>>;

    /// Current enrollments, used as the initial channel membership
    async fn enrollments(&self, cohort_id: CohortId) -> CommunityResult<Vec<SeedMember>>;
}

/// Registry reading the local `cohorts` and `cohort_enrollments` tables
pub struct SqliteCohortRegistry {
    cohorts: CohortRepository,
}

impl SqliteCohortRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { cohorts: CohortRepository::new(pool) }
    }
}

#[async_trait]
impl CohortRegistry for SqliteCohortRegistry {
    async fn cohort(&self, cohort_id: CohortId) -> CommunityResult<Option<CohortSummary>> {
        Ok(self
            .cohorts
            .find(cohort_id)
            .await?
            .map(|cohort| CohortSummary { id: cohort.id, name: cohort.name }))
    }

    async fn list_cohorts(&self) -> CommunityResult<Vec<CohortSummary>> {
        Ok(self
            .cohorts
            .list()
            .await?
            .into_iter()
            .map(|cohort| CohortSummary { id: cohort.id, name: cohort.name })
            .collect())
    }

    async fn enrollments(&self, cohort_id: CohortId) -> CommunityResult<Vec<SeedMember>> {
        Ok(self
            .cohorts
            .enrollments(cohort_id)
            .await?
            .into_iter()
            .map(|enrollment| SeedMember {
                participant_id: enrollment.participant_id,
                display_name: enrollment.display_name,
            })
            .collect())
    }
}
