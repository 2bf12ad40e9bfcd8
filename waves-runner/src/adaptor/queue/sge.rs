//! Sun Grid Engine

use waves_core::domain::{Job, JobStatus};

use super::{QueueDescriptor, job_name, unexpected_submit};
use crate::adaptor::error::AdaptorError;
use crate::adaptor::launcher::SCRIPT_NAME;
use crate::adaptor::status::{StatusMap, UNKNOWN};

const STATES: StatusMap = StatusMap::new(&[
    (UNKNOWN, JobStatus::Undefined),
    ("qw", JobStatus::Queued),
    ("hqw", JobStatus::Queued),
    ("hRwq", JobStatus::Queued),
    ("Rq", JobStatus::Queued),
    ("r", JobStatus::Running),
    ("t", JobStatus::Running),
    ("Rr", JobStatus::Running),
    ("Rt", JobStatus::Running),
    ("s", JobStatus::Suspended),
    ("ts", JobStatus::Suspended),
    ("S", JobStatus::Suspended),
    ("tS", JobStatus::Suspended),
    ("T", JobStatus::Suspended),
    ("tT", JobStatus::Suspended),
    ("Rs", JobStatus::Suspended),
    ("RS", JobStatus::Suspended),
    ("RT", JobStatus::Suspended),
    ("Eqw", JobStatus::Error),
    ("Ehqw", JobStatus::Error),
    ("EhRqw", JobStatus::Error),
    ("dr", JobStatus::Cancelled),
    ("dt", JobStatus::Cancelled),
    ("dRr", JobStatus::Cancelled),
    ("dRt", JobStatus::Cancelled),
    ("ds", JobStatus::Cancelled),
    ("dS", JobStatus::Cancelled),
    ("dT", JobStatus::Cancelled),
]);

pub struct Sge {
    queue: String,
}

impl Sge {
    pub fn new(queue: &str) -> Self {
        Self {
            queue: queue.to_string(),
        }
    }
}

impl QueueDescriptor for Sge {
    fn name(&self) -> &'static str {
        "sge"
    }

    fn states(&self) -> StatusMap {
        STATES
    }

    fn submit_command(&self, job: &Job) -> String {
        format!(
            "qsub -terse -cwd -N {} -q {} -o /dev/null -e /dev/null {}",
            job_name(job),
            self.queue,
            SCRIPT_NAME
        )
    }

    fn parse_submit(&self, stdout: &str) -> Result<String, AdaptorError> {
        // array jobs print "<id>.<range>"
        stdout
            .trim()
            .split('.')
            .next()
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .ok_or_else(|| unexpected_submit("qsub", stdout))
    }

    fn status_command(&self, remote_id: &str) -> String {
        format!(
            "qstat -u '*' | awk -v id={} '$1 == id {{print $5}}'",
            remote_id
        )
    }

    fn cancel_command(&self, remote_id: &str) -> String {
        format!("qdel {}", remote_id)
    }
}
