//! Run details snapshot

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::Job;
use crate::domain::status::JobStatus;

/// File name of the cached run details in the working directory
pub const RUN_DETAILS_FILE: &str = "job_run_details.json";

/// Snapshot of a job run, taken once the job has completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRunDetails {
    pub job_id: Uuid,
    pub remote_job_id: Option<String>,
    pub name: String,
    pub exit_code: Option<i32>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub execution_hosts: Vec<String>,
}

impl JobRunDetails {
    /// Details built from what is already known locally, used when the
    /// backend cannot tell more
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            remote_job_id: job.remote_job_id.clone(),
            name: job.title.clone(),
            exit_code: job.exit_code,
            created_at: job.created_at,
            started_at: job.first_history_at(|status| status == JobStatus::Prepared),
            finished_at: job.first_history_at(|status| status >= JobStatus::Completed),
            execution_hosts: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_job_uses_history_timestamps() {
        let mut job = Job::new("blast", "/tmp/job");
        job.remote_job_id = Some("42".to_string());
        job.set_status(JobStatus::Prepared, "prepared");
        job.set_status(JobStatus::Queued, "queued");

        let details = JobRunDetails::from_job(&job);
        assert_eq!(details.remote_job_id.as_deref(), Some("42"));
        assert_eq!(details.started_at, Some(job.history()[1].timestamp));
        assert_eq!(details.finished_at, None);

        job.set_status(JobStatus::Completed, "done");
        let details = JobRunDetails::from_job(&job);
        assert_eq!(details.finished_at, Some(job.history()[3].timestamp));
    }
}
