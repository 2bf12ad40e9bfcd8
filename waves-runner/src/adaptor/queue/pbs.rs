//! PBS, PBS Pro and TORQUE
//!
//! The three share `qsub`/`qstat`/`qdel` and the single letter job states.
//! PBS Pro only lists finished jobs with `qstat -x`.

use waves_core::domain::{Job, JobStatus};

use super::{QueueDescriptor, job_name, unexpected_submit};
use crate::adaptor::error::AdaptorError;
use crate::adaptor::launcher::SCRIPT_NAME;
use crate::adaptor::status::{StatusMap, UNKNOWN};

const STATES: StatusMap = StatusMap::new(&[
    (UNKNOWN, JobStatus::Undefined),
    ("Q", JobStatus::Queued),
    ("W", JobStatus::Queued),
    ("H", JobStatus::Queued),
    ("T", JobStatus::Queued),
    ("M", JobStatus::Queued),
    ("R", JobStatus::Running),
    ("E", JobStatus::Running),
    ("B", JobStatus::Running),
    ("S", JobStatus::Suspended),
    ("U", JobStatus::Suspended),
    ("C", JobStatus::Completed),
    ("F", JobStatus::Completed),
    ("X", JobStatus::Completed),
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PbsFlavor {
    Pbs,
    PbsPro,
    Torque,
}

pub struct Pbs {
    flavor: PbsFlavor,
    queue: String,
}

impl Pbs {
    pub fn new(flavor: PbsFlavor, queue: &str) -> Self {
        Self {
            flavor,
            queue: queue.to_string(),
        }
    }
}

impl QueueDescriptor for Pbs {
    fn name(&self) -> &'static str {
        match self.flavor {
            PbsFlavor::Pbs => "pbs",
            PbsFlavor::PbsPro => "pbspro",
            PbsFlavor::Torque => "torque",
        }
    }

    fn states(&self) -> StatusMap {
        STATES
    }

    fn submit_command(&self, job: &Job) -> String {
        format!(
            "qsub -N {} -q {} -o /dev/null -e /dev/null {}",
            job_name(job),
            self.queue,
            SCRIPT_NAME
        )
    }

    fn parse_submit(&self, stdout: &str) -> Result<String, AdaptorError> {
        // "<id>.<server>", qstat wants the full id
        stdout
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with(|c: char| c.is_ascii_digit()))
            .map(str::to_string)
            .ok_or_else(|| unexpected_submit("qsub", stdout))
    }

    fn status_command(&self, remote_id: &str) -> String {
        let flags = match self.flavor {
            PbsFlavor::PbsPro => "-fx",
            PbsFlavor::Pbs | PbsFlavor::Torque => "-f",
        };
        format!(
            "qstat {} {} | awk -F' = ' '/job_state/ {{print $2}}'",
            flags, remote_id
        )
    }

    fn cancel_command(&self, remote_id: &str) -> String {
        format!("qdel {}", remote_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submit_keeps_server() {
        let pbs = Pbs::new(PbsFlavor::Torque, "batch");
        assert_eq!(pbs.parse_submit("1234.headnode\n").unwrap(), "1234.headnode");
        assert!(pbs.parse_submit("qsub: Unknown queue\n").is_err());
    }

    #[test]
    fn test_pbspro_lists_finished_jobs() {
        let pro = Pbs::new(PbsFlavor::PbsPro, "workq");
        assert!(pro.status_command("7.srv").starts_with("qstat -fx 7.srv"));

        let torque = Pbs::new(PbsFlavor::Torque, "batch");
        assert!(torque.status_command("7.srv").starts_with("qstat -f 7.srv"));
    }

    #[test]
    fn test_states() {
        assert_eq!(STATES.map("Q"), JobStatus::Queued);
        assert_eq!(STATES.map("E"), JobStatus::Running);
        assert_eq!(STATES.map("C"), JobStatus::Completed);
        assert_eq!(STATES.map("S"), JobStatus::Suspended);
    }
}
