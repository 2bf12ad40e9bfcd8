//! Jobs repository
//!
//! The job store is owned by the web layer. The runner only reads and writes
//! jobs through this interface:
//! - Listing jobs the reconciliation loop still has to drive
//! - Loading and saving single jobs
//! - Listing and deleting jobs past their retention window

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use uuid::Uuid;
use waves_core::domain::{Job, JobStatus};
use waves_core::dto::job::{ExpiredJobsQuery, PendingJobsQuery};

pub type Timestamp = chrono::DateTime<chrono::Utc>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("job store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("job store answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("job store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid job record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("job {0} not found")]
    NotFound(Uuid),
}

/// Repository trait for job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Jobs with a status before `Finished`
    async fn pending_jobs(&self) -> Result<Vec<Job>, RepositoryError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, RepositoryError>;

    /// Inserts or replaces a job
    async fn save_job(&self, job: &Job) -> Result<(), RepositoryError>;

    /// Jobs whose last update is older than the retention window matching
    /// their ownership
    ///
    /// # Arguments
    /// * `anonymous_before` - Cutoff for jobs without a client
    /// * `registered_before` - Cutoff for jobs owned by a registered client
    async fn expired_jobs(
        &self,
        anonymous_before: Timestamp,
        registered_before: Timestamp,
    ) -> Result<Vec<Job>, RepositoryError>;

    /// Removes a job record and its working directory
    async fn delete_job(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// All stored jobs
    async fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError>;
}

/// Whether a job is past its retention window
pub fn is_expired(job: &Job, anonymous_before: Timestamp, registered_before: Timestamp) -> bool {
    let cutoff = match job.client {
        Some(_) => registered_before,
        None => anonymous_before,
    };
    job.updated_at < cutoff
}

/// HTTP implementation of JobRepository, against the web layer's REST API
pub struct HttpJobRepository {
    client: Client,
    base_url: String,
}

impl HttpJobRepository {
    /// Creates a new HTTP job repository
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the web layer (e.g., "http://localhost:8000")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RepositoryError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RepositoryError::Status { status, body })
    }
}

#[async_trait]
impl JobRepository for HttpJobRepository {
    async fn pending_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        let url = format!("{}/api/jobs", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&PendingJobsQuery {
                status_lt: JobStatus::Finished.code(),
            })
            .send()
            .await?;

        let jobs = Self::check(response).await?.json::<Vec<Job>>().await?;
        Ok(jobs)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, RepositoryError> {
        let url = format!("{}/api/jobs/{}", self.base_url, id);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let job = Self::check(response).await?.json::<Job>().await?;
        Ok(Some(job))
    }

    async fn save_job(&self, job: &Job) -> Result<(), RepositoryError> {
        let url = format!("{}/api/jobs/{}", self.base_url, job.id);

        let response = self.client.put(&url).json(job).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn expired_jobs(
        &self,
        anonymous_before: Timestamp,
        registered_before: Timestamp,
    ) -> Result<Vec<Job>, RepositoryError> {
        let url = format!("{}/api/jobs/expired", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&ExpiredJobsQuery {
                anonymous_before,
                registered_before,
            })
            .send()
            .await?;

        let jobs = Self::check(response).await?.json::<Vec<Job>>().await?;
        Ok(jobs)
    }

    async fn delete_job(&self, id: Uuid) -> Result<(), RepositoryError> {
        let url = format!("{}/api/jobs/{}", self.base_url, id);

        let response = self.client.delete(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RepositoryError::NotFound(id));
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        let url = format!("{}/api/jobs", self.base_url);

        let response = self.client.get(&url).send().await?;
        let jobs = Self::check(response).await?.json::<Vec<Job>>().await?;
        Ok(jobs)
    }
}
