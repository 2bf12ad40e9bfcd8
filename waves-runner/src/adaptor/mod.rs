//! Execution adaptors
//!
//! A [`JobAdaptor`] is the single entry point the lifecycle uses to act on a
//! backend. It checks each action against the job status, keeps the
//! connection cached, and moves the job forward when the backend call
//! succeeds. The backend itself only knows how to talk to its execution
//! environment.

pub mod backend;
pub mod config;
pub mod error;
pub mod launcher;
pub mod queue;
pub mod registry;
pub mod status;
pub mod transport;

pub use backend::ExecutionBackend;
pub use config::{AdaptorConfig, AdaptorConfigParam, ConfigError};
pub use error::{AdaptorError, ErrorKind};
pub use registry::{AdaptorClass, AdaptorRegistry};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use waves_core::command;
use waves_core::domain::run_details::RUN_DETAILS_FILE;
use waves_core::domain::{Job, JobRunDetails, JobStatus};
use waves_core::dto::adaptor::AdaptorEnvelope;

use crate::crypto::Cipher;

/// Backend side of an adaptor
///
/// Implementations perform the backend calls only. Status checks, status
/// changes and connection caching are handled by [`JobAdaptor`].
#[async_trait]
pub trait AdaptorBackend: Send + Sync {
    fn host(&self) -> &str;

    fn port(&self) -> Option<u16>;

    async fn connect(&mut self) -> Result<(), AdaptorError>;

    async fn disconnect(&mut self) -> Result<(), AdaptorError>;

    /// Stages the job inputs and launcher
    async fn prepare(&mut self, job: &Job, command_line: &str) -> Result<(), AdaptorError>;

    /// Submits the job, returning the backend job id
    async fn run(&mut self, job: &Job) -> Result<String, AdaptorError>;

    async fn cancel(&mut self, job: &Job) -> Result<(), AdaptorError>;

    /// Current status, already mapped to the canonical vocabulary
    async fn status(&mut self, job: &Job) -> Result<JobStatus, AdaptorError>;

    /// Retrieves the job outputs, returning the exit code
    async fn results(&mut self, job: &Job) -> Result<i32, AdaptorError>;

    async fn run_details(&mut self, _job: &Job) -> Result<Option<JobRunDetails>, AdaptorError> {
        Ok(None)
    }
}

/// What happened to a cancel request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// The backend call failed, the job status is unchanged
    BackendRefused(String),
}

pub struct JobAdaptor {
    clazz: String,
    config: AdaptorConfig,
    backend: Box<dyn AdaptorBackend>,
    connected: bool,
}

impl JobAdaptor {
    pub fn new(
        clazz: impl Into<String>,
        config: AdaptorConfig,
        backend: Box<dyn AdaptorBackend>,
    ) -> Self {
        Self {
            clazz: clazz.into(),
            config,
            backend,
            connected: false,
        }
    }

    pub fn clazz(&self) -> &str {
        &self.clazz
    }

    pub fn config(&self) -> &AdaptorConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// `protocol://host[:port]`, never containing credentials
    pub fn connexion_string(&self) -> String {
        let protocol = self.config.value("protocol").unwrap_or("unknown");
        match self.backend.port() {
            Some(port) => format!("{}://{}:{}", protocol, self.backend.host(), port),
            None => format!("{}://{}", protocol, self.backend.host()),
        }
    }

    pub fn check_ready(&self) -> Result<(), AdaptorError> {
        let missing = self.config.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AdaptorError::NotReady(missing))
        }
    }

    pub async fn connect(&mut self) -> Result<(), AdaptorError> {
        if self.connected {
            return Ok(());
        }
        self.check_ready()?;
        debug!("Connecting to {}", self.connexion_string());
        self.backend.connect().await?;
        self.connected = true;
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<(), AdaptorError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        debug!("Disconnecting from {}", self.connexion_string());
        self.backend.disconnect().await
    }

    /// Full command line of a job: adaptor command followed by the job's
    /// compiled arguments
    pub fn command_line(&self, job: &mut Job) -> String {
        let command = self.config.value("command").unwrap_or_default();
        command::full_command_line(command, job.resolve_command_line())
    }

    pub async fn prepare_job(&mut self, job: &mut Job) -> Result<(), AdaptorError> {
        if job.status() > JobStatus::Created {
            return Err(inconsistent(job, "Created or earlier"));
        }
        self.connect().await?;

        let command_line = self.command_line(job);
        self.backend.prepare(job, &command_line).await?;
        job.set_status(JobStatus::Prepared, "Job prepared for run");
        info!("Job {} prepared on {}: {}", job.id, self.connexion_string(), command_line);
        Ok(())
    }

    pub async fn run_job(&mut self, job: &mut Job) -> Result<(), AdaptorError> {
        if job.status() != JobStatus::Prepared {
            return Err(inconsistent(job, "Prepared"));
        }
        self.connect().await?;

        let remote_id = self.backend.run(job).await?;
        job.remote_job_id = Some(remote_id.clone());
        job.set_status(JobStatus::Queued, format!("Job queued as {}", remote_id));
        info!("Job {} submitted to {} as {}", job.id, self.connexion_string(), remote_id);
        Ok(())
    }

    /// Requests cancellation
    ///
    /// Backend failures do not change the job status: they leave a single
    /// admin-only history note and are reported in the outcome. Jobs not yet
    /// submitted are cancelled without contacting the backend.
    pub async fn cancel_job(&mut self, job: &mut Job) -> Result<CancelOutcome, AdaptorError> {
        if !job.status().is_cancellable() {
            return Err(inconsistent(job, "Suspended or earlier"));
        }

        if job.remote_job_id.is_some() {
            let attempt = match self.connect().await {
                Ok(()) => self.backend.cancel(job).await,
                Err(e) => Err(e),
            };
            if let Err(e) = attempt {
                warn!("Failed to cancel job {} on {}: {}", job.id, self.connexion_string(), e);
                job.add_note(format!("Cancel request failed: {}", e), true);
                return Ok(CancelOutcome::BackendRefused(e.to_string()));
            }
        }

        job.set_status(JobStatus::Cancelled, "Job cancelled");
        info!("Job {} cancelled", job.id);
        Ok(CancelOutcome::Cancelled)
    }

    /// Polls the backend and moves the job forward
    ///
    /// An undefined backend status is an error and leaves the job untouched.
    /// A status behind the current one (scheduler re-queue) is ignored.
    pub async fn job_status(&mut self, job: &mut Job) -> Result<JobStatus, AdaptorError> {
        if job.status().is_terminal() {
            return Err(inconsistent(job, "a non-terminal status"));
        }
        self.connect().await?;

        let status = self.backend.status(job).await?;
        if status == JobStatus::Undefined {
            return Err(AdaptorError::job(format!(
                "{} reported an undefined status for job {}",
                self.connexion_string(),
                job.id
            )));
        }

        if status > job.status() {
            debug!("Job {} is now {:?}", job.id, status);
            job.set_status(status, status.label());
        } else if status < job.status() {
            debug!(
                "Ignoring status {:?} behind {:?} for job {}",
                status,
                job.status(),
                job.id
            );
        }
        Ok(job.status())
    }

    /// Retrieves outputs of a completed job and records its exit code
    pub async fn job_results(&mut self, job: &mut Job) -> Result<(), AdaptorError> {
        if job.status() != JobStatus::Completed {
            return Err(inconsistent(job, "Completed"));
        }
        self.connect().await?;

        let exit_code = self.backend.results(job).await?;
        job.exit_code = Some(exit_code);
        job.results_available = true;
        job.touch();
        info!("Retrieved results of job {} (exit code {})", job.id, exit_code);
        Ok(())
    }

    /// Run details, cached in the working directory once the job completed
    pub async fn job_run_details(&mut self, job: &Job) -> Result<JobRunDetails, AdaptorError> {
        let cache = job.working_directory.join(RUN_DETAILS_FILE);
        if let Ok(content) = tokio::fs::read_to_string(&cache).await {
            match serde_json::from_str(&content) {
                Ok(details) => return Ok(details),
                Err(e) => warn!("Ignoring unreadable {}: {}", cache.display(), e),
            }
        }

        let fetched = match self.connect().await {
            Ok(()) => self.backend.run_details(job).await,
            Err(e) => Err(e),
        };
        let details = match fetched {
            Ok(Some(details)) => details,
            Ok(None) => JobRunDetails::from_job(job),
            Err(e) => {
                warn!("No run details from backend for job {}: {}", job.id, e);
                JobRunDetails::from_job(job)
            }
        };

        if job.status() >= JobStatus::Completed {
            let content = serde_json::to_vec_pretty(&details).map_err(std::io::Error::from)?;
            tokio::fs::write(&cache, content).await?;
        }
        Ok(details)
    }

    /// Configuration dump with secrets masked
    pub fn dump_config(&self) -> String {
        format!(
            "{} ({})\n{}",
            self.clazz,
            self.connexion_string(),
            self.config.dump()
        )
    }

    /// Tries to connect, reporting success
    pub async fn test_connection(&mut self) -> bool {
        let was_connected = self.connected;
        match self.connect().await {
            Ok(()) => {
                if !was_connected {
                    if let Err(e) = self.disconnect().await {
                        warn!("Disconnect after connection test failed: {}", e);
                    }
                }
                true
            }
            Err(e) => {
                warn!("Connection test to {} failed: {}", self.connexion_string(), e);
                false
            }
        }
    }

    pub fn serialize(&self, cipher: &Cipher) -> AdaptorEnvelope {
        AdaptorEnvelope {
            clazz: self.clazz.clone(),
            params: self.config.to_envelope_params(cipher),
        }
    }
}

fn inconsistent(job: &Job, expected: &'static str) -> AdaptorError {
    AdaptorError::InconsistentState {
        current: job.status(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Backend answering from fixed values, counting connections
    struct StubBackend {
        connects: Arc<AtomicU32>,
        status: JobStatus,
        cancel_fails: bool,
    }

    #[async_trait]
    impl AdaptorBackend for StubBackend {
        fn host(&self) -> &str {
            "stub"
        }

        fn port(&self) -> Option<u16> {
            None
        }

        async fn connect(&mut self) -> Result<(), AdaptorError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), AdaptorError> {
            Ok(())
        }

        async fn prepare(&mut self, _job: &Job, _command_line: &str) -> Result<(), AdaptorError> {
            Ok(())
        }

        async fn run(&mut self, _job: &Job) -> Result<String, AdaptorError> {
            Ok("77".to_string())
        }

        async fn cancel(&mut self, _job: &Job) -> Result<(), AdaptorError> {
            if self.cancel_fails {
                Err(AdaptorError::job("qdel: permission denied"))
            } else {
                Ok(())
            }
        }

        async fn status(&mut self, _job: &Job) -> Result<JobStatus, AdaptorError> {
            Ok(self.status)
        }

        async fn results(&mut self, _job: &Job) -> Result<i32, AdaptorError> {
            Ok(0)
        }
    }

    fn adaptor(status: JobStatus, cancel_fails: bool) -> (JobAdaptor, Arc<AtomicU32>) {
        let connects = Arc::new(AtomicU32::new(0));
        let mut config = AdaptorConfig::new([
            AdaptorConfigParam::new("command"),
            AdaptorConfigParam::new("protocol").default_value("stub"),
        ]);
        config.configure([("command", "echo")]).unwrap();
        let backend = StubBackend {
            connects: connects.clone(),
            status,
            cancel_fails,
        };
        (JobAdaptor::new("stub", config, Box::new(backend)), connects)
    }

    #[tokio::test]
    async fn test_connect_is_cached() {
        let (mut adaptor, connects) = adaptor(JobStatus::Running, false);
        adaptor.connect().await.unwrap();
        adaptor.connect().await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        adaptor.disconnect().await.unwrap();
        adaptor.disconnect().await.unwrap();
        adaptor.connect().await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_ready_adaptor_refuses_to_connect() {
        let config = AdaptorConfig::new([AdaptorConfigParam::new("command")]);
        let backend = StubBackend {
            connects: Arc::new(AtomicU32::new(0)),
            status: JobStatus::Running,
            cancel_fails: false,
        };
        let mut adaptor = JobAdaptor::new("stub", config, Box::new(backend));

        let err = adaptor.connect().await.unwrap_err();
        assert!(matches!(err, AdaptorError::NotReady(ref missing) if missing == &["command"]));
    }

    #[tokio::test]
    async fn test_forward_path() {
        let dir = tempfile::tempdir().unwrap();
        let (mut adaptor, _) = adaptor(JobStatus::Completed, false);
        let mut job = Job::new("echo", dir.path());

        adaptor.prepare_job(&mut job).await.unwrap();
        assert_eq!(job.status(), JobStatus::Prepared);

        adaptor.run_job(&mut job).await.unwrap();
        assert_eq!(job.status(), JobStatus::Queued);
        assert_eq!(job.remote_job_id.as_deref(), Some("77"));

        assert_eq!(adaptor.job_status(&mut job).await.unwrap(), JobStatus::Completed);

        adaptor.job_results(&mut job).await.unwrap();
        assert_eq!(job.exit_code, Some(0));
        assert!(job.results_available);
    }

    #[tokio::test]
    async fn test_preconditions_do_not_mutate() {
        let (mut adaptor, _) = adaptor(JobStatus::Running, false);
        let mut job = Job::new("echo", "/tmp/job");
        let history_len = job.history().len();

        assert!(matches!(
            adaptor.run_job(&mut job).await,
            Err(AdaptorError::InconsistentState { .. })
        ));
        assert!(matches!(
            adaptor.job_results(&mut job).await,
            Err(AdaptorError::InconsistentState { .. })
        ));
        assert_eq!(job.status(), JobStatus::Created);
        assert_eq!(job.history().len(), history_len);
    }

    #[tokio::test]
    async fn test_backward_status_is_ignored() {
        let (mut adaptor, _) = adaptor(JobStatus::Queued, false);
        let mut job = Job::new("echo", "/tmp/job");
        job.remote_job_id = Some("77".to_string());
        job.set_status(JobStatus::Running, "running");

        assert_eq!(adaptor.job_status(&mut job).await.unwrap(), JobStatus::Running);
    }

    #[tokio::test]
    async fn test_undefined_status_is_an_error() {
        let (mut adaptor, _) = adaptor(JobStatus::Undefined, false);
        let mut job = Job::new("echo", "/tmp/job");
        job.set_status(JobStatus::Queued, "queued");

        let err = adaptor.job_status(&mut job).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(job.status(), JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_cancel_failure_leaves_one_admin_note() {
        let (mut adaptor, _) = adaptor(JobStatus::Running, true);
        let mut job = Job::new("echo", "/tmp/job");
        job.remote_job_id = Some("77".to_string());
        job.set_status(JobStatus::Running, "running");
        let history_len = job.history().len();

        let outcome = adaptor.cancel_job(&mut job).await.unwrap();
        assert!(matches!(outcome, CancelOutcome::BackendRefused(_)));
        assert_eq!(job.status(), JobStatus::Running);
        assert_eq!(job.history().len(), history_len + 1);
        assert!(job.history().last().unwrap().is_admin);
    }

    #[tokio::test]
    async fn test_cancel_before_submission_is_local() {
        let (mut adaptor, connects) = adaptor(JobStatus::Running, true);
        let mut job = Job::new("echo", "/tmp/job");

        let outcome = adaptor.cancel_job(&mut job).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Cancelled);
        assert_eq!(job.status(), JobStatus::Cancelled);
        assert_eq!(connects.load(Ordering::SeqCst), 0);

        assert!(adaptor.cancel_job(&mut job).await.is_err());
    }

    #[tokio::test]
    async fn test_run_details_are_cached_once_completed() {
        let dir = tempfile::tempdir().unwrap();
        let (mut adaptor, _) = adaptor(JobStatus::Completed, false);
        let mut job = Job::new("echo", dir.path());
        job.set_status(JobStatus::Completed, "done");

        let details = adaptor.job_run_details(&job).await.unwrap();
        assert!(dir.path().join(RUN_DETAILS_FILE).exists());

        job.title = "renamed".to_string();
        let cached = adaptor.job_run_details(&job).await.unwrap();
        assert_eq!(cached, details);
    }

    #[test]
    fn test_dump_config_and_connexion_string() {
        let (adaptor, _) = adaptor(JobStatus::Running, false);
        assert_eq!(adaptor.connexion_string(), "stub://stub");
        let dump = adaptor.dump_config();
        assert!(dump.starts_with("stub (stub://stub)\n"));
        assert!(dump.contains("command: echo"));
    }
}
