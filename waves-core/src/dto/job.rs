//! Job store query DTOs

use serde::{Deserialize, Serialize};

/// Query for jobs the reconciliation loop still has to drive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingJobsQuery {
    /// Status code upper bound, exclusive
    pub status_lt: i8,
}

/// Query for jobs past their retention window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiredJobsQuery {
    pub anonymous_before: chrono::DateTime<chrono::Utc>,
    pub registered_before: chrono::DateTime<chrono::Utc>,
}
