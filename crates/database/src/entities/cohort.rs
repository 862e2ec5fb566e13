use serde::{Deserialize, Serialize};

/// A cohort as known to the cohort registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub cohort_id: i64,
    pub participant_id: i64,
    pub display_name: Option<String>,
}
