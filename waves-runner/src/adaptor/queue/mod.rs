//! Scheduler queue descriptors
//!
//! A queue descriptor turns a prepared job into a scheduler submission and
//! knows the scheduler's status and cancel commands. It only builds command
//! lines; the transport runs them.

mod condor;
mod lsf;
mod pbs;
mod sge;
mod slurm;

pub use condor::Condor;
pub use lsf::Lsf;
pub use pbs::{Pbs, PbsFlavor};
pub use sge::Sge;
pub use slurm::Slurm;

use waves_core::domain::Job;

use crate::adaptor::config::ConfigError;
use crate::adaptor::error::AdaptorError;
use crate::adaptor::status::StatusMap;
use crate::adaptor::transport::quote;

/// Scheduler protocols accepted by cluster adaptors
pub const PROTOCOLS: &[&str] = &["sge", "slurm", "pbs", "condor", "pbspro", "lsf", "torque"];

pub trait QueueDescriptor: Send + Sync {
    /// Scheduler protocol name
    fn name(&self) -> &'static str;

    fn states(&self) -> StatusMap;

    /// Extra files to write next to the launcher before staging
    fn submit_files(&self, _job: &Job) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Submission command, run from the job directory
    fn submit_command(&self, job: &Job) -> String;

    /// Extracts the scheduler job id from the submission output
    fn parse_submit(&self, stdout: &str) -> Result<String, AdaptorError>;

    fn status_command(&self, remote_id: &str) -> String;

    /// Native state from the status command output, `None` when the
    /// scheduler no longer knows the job
    fn parse_status(&self, stdout: &str) -> Option<String> {
        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }

    fn cancel_command(&self, remote_id: &str) -> String;
}

/// Builds the descriptor for a scheduler protocol
///
/// The queue name ends up in shell commands, so it is quoted here for every
/// scheduler submitted from the shell. Condor takes it in a submit file,
/// where only line breaks matter.
pub fn for_protocol(protocol: &str, queue: &str) -> Result<Box<dyn QueueDescriptor>, AdaptorError> {
    if queue.chars().any(char::is_control) {
        return Err(ConfigError::InvalidValue {
            name: "queue".to_string(),
            reason: "control characters are not allowed".to_string(),
        }
        .into());
    }
    let quoted = quote(queue)?;

    let descriptor: Box<dyn QueueDescriptor> = match protocol {
        "sge" => Box::new(Sge::new(&quoted)),
        "slurm" => Box::new(Slurm::new(&quoted)),
        "pbs" => Box::new(Pbs::new(PbsFlavor::Pbs, &quoted)),
        "pbspro" => Box::new(Pbs::new(PbsFlavor::PbsPro, &quoted)),
        "torque" => Box::new(Pbs::new(PbsFlavor::Torque, &quoted)),
        "lsf" => Box::new(Lsf::new(&quoted)),
        "condor" => Box::new(Condor::new(queue)),
        other => {
            return Err(AdaptorError::NotAvailable(format!(
                "unsupported scheduler '{}'",
                other
            )));
        }
    };
    Ok(descriptor)
}

/// Scheduler-side job name
pub(crate) fn job_name(job: &Job) -> String {
    let id = job.id.simple().to_string();
    format!("waves-{}", &id[..8])
}

/// Output of a submission that did not yield a job id
pub(crate) fn unexpected_submit(scheduler: &str, stdout: &str) -> AdaptorError {
    AdaptorError::job(format!(
        "unexpected {} submission output: '{}'",
        scheduler,
        stdout.trim()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_protocol_has_a_well_formed_state_table() {
        for protocol in PROTOCOLS {
            let descriptor = for_protocol(protocol, "default").unwrap();
            assert_eq!(descriptor.name(), *protocol);
            assert_eq!(descriptor.states().check(), Ok(()), "{}", protocol);
        }
    }

    #[test]
    fn test_unknown_protocol() {
        assert!(matches!(
            for_protocol("moab", "q"),
            Err(AdaptorError::NotAvailable(_))
        ));
    }

    #[test]
    fn test_queue_name_is_quoted_in_submissions() {
        let job = Job::new("blast", "/tmp/job");
        for protocol in ["sge", "slurm", "pbs", "lsf"] {
            let descriptor = for_protocol(protocol, "long; touch hacked").unwrap();
            let command = descriptor.submit_command(&job);
            assert!(command.contains("'long; touch hacked'"), "{}", command);
        }

        let descriptor = for_protocol("slurm", "long").unwrap();
        assert!(!descriptor.submit_command(&job).contains('\''));
    }

    #[test]
    fn test_queue_name_with_line_break_is_rejected() {
        for protocol in ["slurm", "condor"] {
            assert!(matches!(
                for_protocol(protocol, "bioinfo\nexecutable = /bin/evil"),
                Err(AdaptorError::Config(ConfigError::InvalidValue { .. }))
            ));
        }
    }

    #[test]
    fn test_job_name() {
        let job = Job::new("blast", "/tmp/job");
        let name = job_name(&job);
        assert!(name.starts_with("waves-"));
        assert_eq!(name.len(), "waves-".len() + 8);
    }
}
