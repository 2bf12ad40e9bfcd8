//! IBM Spectrum LSF

use waves_core::domain::{Job, JobStatus};

use super::{QueueDescriptor, job_name, unexpected_submit};
use crate::adaptor::error::AdaptorError;
use crate::adaptor::launcher::SCRIPT_NAME;
use crate::adaptor::status::{StatusMap, UNKNOWN};

const STATES: StatusMap = StatusMap::new(&[
    (UNKNOWN, JobStatus::Undefined),
    ("UNKWN", JobStatus::Undefined),
    ("PEND", JobStatus::Queued),
    ("WAIT", JobStatus::Queued),
    ("PROV", JobStatus::Queued),
    ("RUN", JobStatus::Running),
    ("PSUSP", JobStatus::Suspended),
    ("USUSP", JobStatus::Suspended),
    ("SSUSP", JobStatus::Suspended),
    ("DONE", JobStatus::Completed),
    ("EXIT", JobStatus::Completed),
    ("ZOMBI", JobStatus::Error),
]);

pub struct Lsf {
    queue: String,
}

impl Lsf {
    pub fn new(queue: &str) -> Self {
        Self {
            queue: queue.to_string(),
        }
    }
}

impl QueueDescriptor for Lsf {
    fn name(&self) -> &'static str {
        "lsf"
    }

    fn states(&self) -> StatusMap {
        STATES
    }

    fn submit_command(&self, job: &Job) -> String {
        format!(
            "bsub -J {} -q {} -o /dev/null -e /dev/null sh {}",
            job_name(job),
            self.queue,
            SCRIPT_NAME
        )
    }

    fn parse_submit(&self, stdout: &str) -> Result<String, AdaptorError> {
        // "Job <123> is submitted to queue <normal>."
        stdout
            .split_once("Job <")
            .and_then(|(_, rest)| rest.split_once('>'))
            .map(|(id, _)| id.to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| unexpected_submit("bsub", stdout))
    }

    fn status_command(&self, remote_id: &str) -> String {
        format!("bjobs -noheader -o stat {}", remote_id)
    }

    fn cancel_command(&self, remote_id: &str) -> String {
        format!("bkill {}", remote_id)
    }
}
