//! Job lifecycle service
//!
//! Drives a job through its state machine using an adaptor:
//! - Prepare, launch, poll and fetch results, one action per call
//! - Retry transient backend failures up to a bound, then fail the job
//! - Evaluate fetched results into the final status
//! - Best-effort cancellation
//!
//! Every action persists the job through the repository, whatever its
//! outcome, so the history recorded by the action is never lost.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use waves_core::domain::{Job, JobStatus};

use crate::adaptor::{AdaptorError, CancelOutcome, ErrorKind, JobAdaptor};
use crate::repository::{JobRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The action is not legal for the job's current status
    #[error("inconsistent job state: {0}")]
    InconsistentState(#[source] AdaptorError),

    /// A failure retrying cannot fix, the job is left as it was
    #[error(transparent)]
    Adaptor(AdaptorError),

    #[error("failed to save job: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<AdaptorError> for LifecycleError {
    fn from(e: AdaptorError) -> Self {
        match e.kind() {
            ErrorKind::PreconditionViolation => LifecycleError::InconsistentState(e),
            ErrorKind::Transient | ErrorKind::Permanent => LifecycleError::Adaptor(e),
        }
    }
}

/// What one lifecycle action did to a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The job moved to a new status
    Advanced(JobStatus),
    /// The backend answered, nothing changed
    Unchanged(JobStatus),
    /// A transient failure was recorded, the action runs again next time
    Retrying { attempt: u32, reason: String },
    /// The job was moved to `Error`
    Failed(String),
    /// The cancel request did not reach the backend
    CancelRefused(String),
}

/// Service trait for driving jobs through their lifecycle
#[async_trait]
pub trait LifecycleService: Send + Sync {
    /// Stages a `Created` job
    async fn prepare(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError>;

    /// Submits a `Prepared` job
    async fn launch(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError>;

    /// Refreshes the status of a submitted job
    async fn poll_status(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError>;

    /// Retrieves and evaluates the outputs of a `Completed` job
    async fn fetch_results(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError>;

    /// Requests cancellation, leaving the status untouched when the backend
    /// refuses
    async fn cancel(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError>;

    /// Runs the one action matching the job's status
    async fn step(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError> {
        match job.status() {
            JobStatus::Created => self.prepare(job, adaptor).await,
            JobStatus::Prepared => self.launch(job, adaptor).await,
            JobStatus::Completed => self.fetch_results(job, adaptor).await,
            _ => self.poll_status(job, adaptor).await,
        }
    }
}

/// Standard implementation of LifecycleService
pub struct StandardLifecycleService {
    repository: Arc<dyn JobRepository>,
    max_retries: u32,
}

impl StandardLifecycleService {
    /// Creates a new lifecycle service
    ///
    /// # Arguments
    /// * `repository` - Store the jobs are saved to after each action
    /// * `max_retries` - Consecutive transient failures tolerated per job
    pub fn new(repository: Arc<dyn JobRepository>, max_retries: u32) -> Self {
        Self {
            repository,
            max_retries,
        }
    }

    /// Applies the retry policy to a failed action
    ///
    /// Non-transient failures are returned untouched, the job is not saved.
    async fn handle_failure(
        &self,
        job: &mut Job,
        action: &str,
        e: AdaptorError,
    ) -> Result<StepOutcome, LifecycleError> {
        if e.kind() != ErrorKind::Transient {
            return Err(e.into());
        }

        job.retry_count += 1;
        let outcome = if job.retry_count > self.max_retries {
            let reason = format!(
                "{} failed after {} attempts: {}",
                action, job.retry_count, e
            );
            error!("Job {}: {}", job.id, reason);
            job.set_status(JobStatus::Error, reason.clone());
            StepOutcome::Failed(reason)
        } else {
            warn!(
                "Job {}: {} failed (attempt {}/{}): {}",
                job.id,
                action,
                job.retry_count,
                self.max_retries + 1,
                e
            );
            job.add_note(format!("[Retry] {} failed: {}", action, e), true);
            StepOutcome::Retrying {
                attempt: job.retry_count,
                reason: e.to_string(),
            }
        };

        self.repository.save_job(job).await?;
        Ok(outcome)
    }

    async fn succeeded(
        &self,
        job: &mut Job,
        outcome: StepOutcome,
    ) -> Result<StepOutcome, LifecycleError> {
        job.retry_count = 0;
        self.repository.save_job(job).await?;
        Ok(outcome)
    }

    /// Final status of a job whose outputs were retrieved
    async fn evaluate_results(job: &Job) -> (JobStatus, &'static str) {
        if job.exit_code.is_some_and(|code| code != 0) {
            return (JobStatus::Error, "Error detected in job.stderr");
        }
        let stderr_len = tokio::fs::metadata(job.stderr_path())
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);
        if stderr_len > 0 {
            (JobStatus::Warning, "Job finished with messages in job.stderr")
        } else {
            (JobStatus::Finished, "Data retrieved")
        }
    }
}

#[async_trait]
impl LifecycleService for StandardLifecycleService {
    async fn prepare(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError> {
        debug!("Preparing job {}", job.id);
        match adaptor.prepare_job(job).await {
            Ok(()) => {
                let status = job.status();
                self.succeeded(job, StepOutcome::Advanced(status)).await
            }
            Err(e) => self.handle_failure(job, "prepare", e).await,
        }
    }

    async fn launch(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError> {
        debug!("Launching job {}", job.id);
        match adaptor.run_job(job).await {
            Ok(()) => {
                let status = job.status();
                self.succeeded(job, StepOutcome::Advanced(status)).await
            }
            Err(e) => self.handle_failure(job, "launch", e).await,
        }
    }

    async fn poll_status(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError> {
        let before = job.status();
        match adaptor.job_status(job).await {
            Ok(status) if status != before => {
                info!("Job {} status changed: {} -> {}", job.id, before, status);
                self.succeeded(job, StepOutcome::Advanced(status)).await
            }
            Ok(status) => self.succeeded(job, StepOutcome::Unchanged(status)).await,
            Err(e) => self.handle_failure(job, "status", e).await,
        }
    }

    async fn fetch_results(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError> {
        debug!("Retrieving results of job {}", job.id);
        if let Err(e) = adaptor.job_results(job).await {
            if e.kind() == ErrorKind::PreconditionViolation {
                return Err(e.into());
            }
            let reason = format!("data retrieval failed: {}", e);
            error!("Job {}: {}", job.id, reason);
            job.set_status(JobStatus::Error, reason.clone());
            self.repository.save_job(job).await?;
            return Ok(StepOutcome::Failed(reason));
        }

        let (status, message) = Self::evaluate_results(job).await;
        job.set_status(status, message);
        info!(
            "Job {} ended as {} (exit code {:?})",
            job.id, status, job.exit_code
        );
        self.succeeded(job, StepOutcome::Advanced(status)).await
    }

    async fn cancel(
        &self,
        job: &mut Job,
        adaptor: &mut JobAdaptor,
    ) -> Result<StepOutcome, LifecycleError> {
        let outcome = adaptor.cancel_job(job).await?;
        self.repository.save_job(job).await?;
        Ok(match outcome {
            CancelOutcome::Cancelled => StepOutcome::Advanced(JobStatus::Cancelled),
            CancelOutcome::BackendRefused(reason) => StepOutcome::CancelRefused(reason),
        })
    }
}
