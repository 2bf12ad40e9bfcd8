//! SLURM

use waves_core::domain::{Job, JobStatus};

use super::{QueueDescriptor, job_name, unexpected_submit};
use crate::adaptor::error::AdaptorError;
use crate::adaptor::launcher::SCRIPT_NAME;
use crate::adaptor::status::{StatusMap, UNKNOWN};

// FAILED only means a non-zero exit code: results are still fetched
const STATES: StatusMap = StatusMap::new(&[
    (UNKNOWN, JobStatus::Undefined),
    ("PENDING", JobStatus::Queued),
    ("CONFIGURING", JobStatus::Queued),
    ("REQUEUED", JobStatus::Queued),
    ("RUNNING", JobStatus::Running),
    ("COMPLETING", JobStatus::Running),
    ("SUSPENDED", JobStatus::Suspended),
    ("STOPPED", JobStatus::Suspended),
    ("COMPLETED", JobStatus::Completed),
    ("FAILED", JobStatus::Completed),
    ("CANCELLED", JobStatus::Cancelled),
    ("NODE_FAIL", JobStatus::Error),
    ("TIMEOUT", JobStatus::Error),
    ("OUT_OF_MEMORY", JobStatus::Error),
    ("BOOT_FAIL", JobStatus::Error),
    ("PREEMPTED", JobStatus::Error),
    ("DEADLINE", JobStatus::Error),
]);

pub struct Slurm {
    partition: String,
}

impl Slurm {
    pub fn new(partition: &str) -> Self {
        Self {
            partition: partition.to_string(),
        }
    }
}

impl QueueDescriptor for Slurm {
    fn name(&self) -> &'static str {
        "slurm"
    }

    fn states(&self) -> StatusMap {
        STATES
    }

    fn submit_command(&self, job: &Job) -> String {
        format!(
            "sbatch --parsable -J {} -p {} -o /dev/null -e /dev/null {}",
            job_name(job),
            self.partition,
            SCRIPT_NAME
        )
    }

    fn parse_submit(&self, stdout: &str) -> Result<String, AdaptorError> {
        // "<id>" or "<id>;<cluster>"
        stdout
            .trim()
            .split(';')
            .next()
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .ok_or_else(|| unexpected_submit("sbatch", stdout))
    }

    fn status_command(&self, remote_id: &str) -> String {
        format!("squeue -h -j {} -o %T", remote_id)
    }

    fn parse_status(&self, stdout: &str) -> Option<String> {
        // "CANCELLED by 1000"
        stdout
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .next()
            .map(str::to_string)
    }

    fn cancel_command(&self, remote_id: &str) -> String {
        format!("scancel {}", remote_id)
    }
}
