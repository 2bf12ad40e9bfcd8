//! Job history records

use serde::{Deserialize, Serialize};

use crate::domain::status::JobStatus;

/// One immutable entry in a job's audit trail
///
/// Records are only ever appended through [`crate::domain::job::Job`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHistory {
    pub status: JobStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub message: String,
    /// Hidden from end users, shown to operators
    pub is_admin: bool,
}

impl JobHistory {
    pub fn new(status: JobStatus, message: impl Into<String>, is_admin: bool) -> Self {
        Self {
            status,
            timestamp: chrono::Utc::now(),
            message: message.into(),
            is_admin,
        }
    }
}
