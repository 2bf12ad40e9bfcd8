//! HTCondor
//!
//! Condor has no queues: the configured queue is used as the accounting
//! group of the submission.

use waves_core::domain::{Job, JobStatus};

use super::{QueueDescriptor, job_name, unexpected_submit};
use crate::adaptor::error::AdaptorError;
use crate::adaptor::launcher::SCRIPT_NAME;
use crate::adaptor::status::{StatusMap, UNKNOWN};

pub const SUBMIT_FILE: &str = ".waves_job.sub";

const STATES: StatusMap = StatusMap::new(&[
    (UNKNOWN, JobStatus::Undefined),
    ("0", JobStatus::Queued),
    ("1", JobStatus::Queued),
    ("2", JobStatus::Running),
    ("3", JobStatus::Cancelled),
    ("4", JobStatus::Completed),
    ("5", JobStatus::Suspended),
    ("6", JobStatus::Running),
    ("7", JobStatus::Suspended),
]);

pub struct Condor {
    accounting_group: String,
}

impl Condor {
    pub fn new(queue: &str) -> Self {
        Self {
            accounting_group: queue.to_string(),
        }
    }
}

impl QueueDescriptor for Condor {
    fn name(&self) -> &'static str {
        "condor"
    }

    fn states(&self) -> StatusMap {
        STATES
    }

    fn submit_files(&self, job: &Job) -> Vec<(String, String)> {
        let description = format!(
            "universe = vanilla\n\
             executable = /bin/sh\n\
             arguments = {script}\n\
             output = /dev/null\n\
             error = /dev/null\n\
             log = .waves_condor.log\n\
             should_transfer_files = NO\n\
             accounting_group = {group}\n\
             batch_name = {name}\n\
             queue\n",
            script = SCRIPT_NAME,
            group = self.accounting_group,
            name = job_name(job),
        );
        vec![(SUBMIT_FILE.to_string(), description)]
    }

    fn submit_command(&self, _job: &Job) -> String {
        format!("condor_submit {}", SUBMIT_FILE)
    }

    fn parse_submit(&self, stdout: &str) -> Result<String, AdaptorError> {
        // "1 job(s) submitted to cluster 123."
        stdout
            .split_once("cluster")
            .map(|(_, rest)| rest.trim().trim_end_matches('.').to_string())
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| unexpected_submit("condor_submit", stdout))
    }

    fn status_command(&self, remote_id: &str) -> String {
        format!(
            "condor_q {id} -af JobStatus; condor_history {id} -af JobStatus -limit 1",
            id = remote_id
        )
    }

    fn cancel_command(&self, remote_id: &str) -> String {
        format!("condor_rm {}", remote_id)
    }
}
