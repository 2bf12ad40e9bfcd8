//! Filesystem job store
//!
//! One directory per job under `<root>/jobs/<id>/`, holding `job.json`. The
//! directory doubles as the job's default working directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;
use waves_core::domain::Job;

use super::jobs::{JobRepository, RepositoryError, Timestamp, is_expired};

const JOB_FILE: &str = "job.json";

pub struct FsJobRepository {
    jobs_dir: PathBuf,
}

impl FsJobRepository {
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self {
            jobs_dir: data_root.as_ref().join("jobs"),
        }
    }

    /// Directory of a job's record
    pub fn job_dir(&self, id: Uuid) -> PathBuf {
        self.jobs_dir.join(id.to_string())
    }

    async fn load(&self, path: &Path) -> Result<Job, RepositoryError> {
        let content = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&content)?)
    }

    async fn load_all(&self) -> Result<Vec<Job>, RepositoryError> {
        let mut entries = match tokio::fs::read_dir(&self.jobs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join(JOB_FILE);
            if !tokio::fs::try_exists(&path).await? {
                continue;
            }
            match self.load(&path).await {
                Ok(job) => jobs.push(job),
                Err(e) => warn!("Skipping unreadable job record {}: {}", path.display(), e),
            }
        }
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }
}

#[async_trait]
impl JobRepository for FsJobRepository {
    async fn pending_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        let mut jobs = self.load_all().await?;
        jobs.retain(|job| job.status().is_pending());
        Ok(jobs)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, RepositoryError> {
        let path = self.job_dir(id).join(JOB_FILE);
        match self.load(&path).await {
            Ok(job) => Ok(Some(job)),
            Err(RepositoryError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save_job(&self, job: &Job) -> Result<(), RepositoryError> {
        let dir = self.job_dir(job.id);
        tokio::fs::create_dir_all(&dir).await?;

        // write then rename so readers never see a partial record
        let content = serde_json::to_vec_pretty(job)?;
        let tmp = dir.join(format!(".{}.tmp", JOB_FILE));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, dir.join(JOB_FILE)).await?;

        debug!("Saved job {} ({:?})", job.id, job.status());
        Ok(())
    }

    async fn expired_jobs(
        &self,
        anonymous_before: Timestamp,
        registered_before: Timestamp,
    ) -> Result<Vec<Job>, RepositoryError> {
        let mut jobs = self.load_all().await?;
        jobs.retain(|job| is_expired(job, anonymous_before, registered_before));
        Ok(jobs)
    }

    async fn delete_job(&self, id: Uuid) -> Result<(), RepositoryError> {
        let Some(job) = self.get_job(id).await? else {
            return Err(RepositoryError::NotFound(id));
        };

        let record_dir = self.job_dir(id);
        if job.working_directory != record_dir {
            match tokio::fs::remove_dir_all(&job.working_directory).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tokio::fs::remove_dir_all(&record_dir).await?;
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        self.load_all().await
    }
}
