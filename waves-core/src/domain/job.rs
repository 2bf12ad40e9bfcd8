//! Job domain types

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::command;
use crate::domain::history::JobHistory;
use crate::domain::param::{ParamDescriptor, ParamType, ParamValue};
use crate::domain::status::JobStatus;
use crate::dto::adaptor::AdaptorEnvelope;

/// File name of the captured standard output in the working directory
pub const STDOUT_FILE: &str = "job.stdout";
/// File name of the captured standard error in the working directory
pub const STDERR_FILE: &str = "job.stderr";

/// A job submitted against a service
///
/// Created by the web layer in `Created` status. From then on only the
/// execution layer changes it, and every status change goes through
/// [`Job::set_status`] so that the history stays complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    status: JobStatus,
    pub remote_job_id: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub exit_code: Option<i32>,
    pub working_directory: PathBuf,
    pub command_line_arguments: Option<String>,
    #[serde(default)]
    pub results_available: bool,
    /// Which adaptor configuration executes (or executed) this job
    pub adaptor_config: Option<AdaptorEnvelope>,
    #[serde(default)]
    pub inputs: Vec<JobInput>,
    #[serde(default)]
    pub outputs: Vec<JobOutput>,
    /// Owning registered user, `None` for anonymous submissions
    pub client: Option<String>,
    /// Last status message
    pub message: Option<String>,
    #[serde(default)]
    history: Vec<JobHistory>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A declared job input and its submitted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInput {
    #[serde(flatten)]
    pub param: ParamDescriptor,
    #[serde(default)]
    pub param_type: ParamType,
}

/// A declared job output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub name: String,
    pub file_name: String,
}

impl Job {
    pub fn new(title: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        let now = chrono::Utc::now();
        let mut job = Self {
            id: Uuid::new_v4(),
            title: title.into(),
            status: JobStatus::Created,
            remote_job_id: None,
            retry_count: 0,
            exit_code: None,
            working_directory: working_directory.into(),
            command_line_arguments: None,
            results_available: false,
            adaptor_config: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            client: None,
            message: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        job.history
            .push(JobHistory::new(JobStatus::Created, "Job created", false));
        job
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Changes the status and records it in the history
    ///
    /// Returns `false` (and records nothing) when the job already has this
    /// status.
    pub fn set_status(&mut self, status: JobStatus, message: impl Into<String>) -> bool {
        if status == self.status {
            return false;
        }
        let message = message.into();
        self.status = status;
        self.message = Some(message.clone());
        self.history.push(JobHistory::new(status, message, false));
        self.touch();
        true
    }

    /// Appends a note under the current status without changing it
    pub fn add_note(&mut self, message: impl Into<String>, is_admin: bool) {
        self.history
            .push(JobHistory::new(self.status, message, is_admin));
        self.touch();
    }

    /// Full audit trail, oldest first
    pub fn history(&self) -> &[JobHistory] {
        &self.history
    }

    /// History without admin-only records
    pub fn public_history(&self) -> impl Iterator<Item = &JobHistory> {
        self.history.iter().filter(|record| !record.is_admin)
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }

    pub fn with_input(mut self, param: ParamDescriptor, param_type: ParamType) -> Self {
        self.inputs.push(JobInput { param, param_type });
        self
    }

    /// Command line arguments, compiled from the inputs on first use
    pub fn resolve_command_line(&mut self) -> &str {
        let arguments = self
            .command_line_arguments
            .get_or_insert_with(|| command::compile(self.inputs.iter().map(|input| &input.param)));
        arguments.as_str()
    }

    /// Names of the input files to stage, relative to the working directory
    ///
    /// Fails on the first name that could reach outside the working
    /// directory: absolute paths and paths with `..` components.
    pub fn input_files(&self) -> Result<Vec<String>, String> {
        self.inputs
            .iter()
            .filter(|input| input.param_type == ParamType::File)
            .filter_map(|input| match input.param.resolved_value() {
                Some(ParamValue::Text(name)) if !name.is_empty() => Some(name),
                _ => None,
            })
            .map(|name| {
                let inside = Path::new(name)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
                if inside {
                    Ok(name.clone())
                } else {
                    Err(format!("input file '{}' is outside the working directory", name))
                }
            })
            .collect()
    }

    pub fn stdout_path(&self) -> PathBuf {
        self.working_directory.join(STDOUT_FILE)
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.working_directory.join(STDERR_FILE)
    }

    /// Timestamp of the first history record matching the predicate
    pub fn first_history_at<F>(&self, predicate: F) -> Option<chrono::DateTime<chrono::Utc>>
    where
        F: Fn(JobStatus) -> bool,
    {
        self.history
            .iter()
            .find(|record| predicate(record.status))
            .map(|record| record.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::param::CmdFormat;

    #[test]
    fn test_new_job_is_created_with_history() {
        let job = Job::new("blast", "/tmp/job");
        assert_eq!(job.status(), JobStatus::Created);
        assert_eq!(job.history().len(), 1);
        assert_eq!(job.retry_count, 0);
    }

    #[test]
    fn test_set_status_appends_history_only_on_change() {
        let mut job = Job::new("blast", "/tmp/job");

        assert!(job.set_status(JobStatus::Prepared, "Job prepared"));
        assert!(!job.set_status(JobStatus::Prepared, "again"));

        assert_eq!(job.history().len(), 2);
        let last = job.history().last().unwrap();
        assert_eq!(last.status, JobStatus::Prepared);
        assert_eq!(last.message, "Job prepared");
        assert_eq!(job.message.as_deref(), Some("Job prepared"));
    }

    #[test]
    fn test_public_history_hides_admin_notes() {
        let mut job = Job::new("blast", "/tmp/job");
        job.add_note("[Retry] ssh: connection refused", true);
        job.add_note("visible", false);

        assert_eq!(job.history().len(), 3);
        let public: Vec<_> = job.public_history().map(|h| h.message.as_str()).collect();
        assert_eq!(public, vec!["Job created", "visible"]);
    }

    #[test]
    fn test_resolve_command_line_is_cached() {
        let mut job = Job::new("echo", "/tmp/job").with_input(
            ParamDescriptor::new("text", CmdFormat::Posix).with_value("hello"),
            ParamType::Text,
        );

        assert_eq!(job.resolve_command_line(), "hello");
        job.inputs.clear();
        assert_eq!(job.resolve_command_line(), "hello");
    }

    #[test]
    fn test_input_files() {
        let job = Job::new("blast", "/tmp/job")
            .with_input(
                ParamDescriptor::new("query", CmdFormat::Simple).with_value("query.fa"),
                ParamType::File,
            )
            .with_input(
                ParamDescriptor::new("evalue", CmdFormat::Simple).with_value("1e-5"),
                ParamType::Decimal,
            )
            .with_input(ParamDescriptor::new("db", CmdFormat::Simple), ParamType::File);

        assert_eq!(job.input_files(), Ok(vec!["query.fa".to_string()]));
    }

    #[test]
    fn test_input_files_stay_in_working_directory() {
        let with_file = |name: &str| {
            Job::new("blast", "/tmp/job").with_input(
                ParamDescriptor::new("query", CmdFormat::Simple).with_value(name),
                ParamType::File,
            )
        };

        assert_eq!(
            with_file("data/query.fa").input_files(),
            Ok(vec!["data/query.fa".to_string()])
        );
        assert!(with_file("../other/secret.txt").input_files().is_err());
        assert!(with_file("data/../../etc/passwd").input_files().is_err());
        assert!(with_file("/etc/passwd").input_files().is_err());
    }

    #[test]
    fn test_job_json_roundtrip_keeps_history() {
        let mut job = Job::new("blast", "/tmp/job");
        job.set_status(JobStatus::Prepared, "Job prepared");

        let json = serde_json::to_string(&job).unwrap();
        let restored: Job = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.status(), JobStatus::Prepared);
        assert_eq!(restored.history(), job.history());
    }
}
