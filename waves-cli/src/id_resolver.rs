//! ID resolver module
//!
//! Resolves a job ID or an unambiguous prefix of one to the stored job, so
//! that operators can type short IDs.

use anyhow::{Context, Result, anyhow};
use uuid::Uuid;
use waves_core::domain::Job;
use waves_runner::repository::JobRepository;

/// Load a job by full ID or unambiguous prefix
///
/// # Errors
/// Returns an error if:
/// - No job matches the prefix
/// - Multiple jobs match the prefix (ambiguous)
/// - The job store cannot be read
pub async fn resolve_job(repository: &dyn JobRepository, id_or_prefix: &str) -> Result<Job> {
    if let Ok(id) = Uuid::parse_str(id_or_prefix) {
        return repository
            .get_job(id)
            .await
            .context("Failed to fetch job")?
            .ok_or_else(|| anyhow!("Job {} not found", id));
    }

    let jobs = repository
        .list_jobs()
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    match_prefix(jobs, id_or_prefix)
}

fn match_prefix(jobs: Vec<Job>, prefix: &str) -> Result<Job> {
    let prefix = prefix.to_lowercase();
    let mut matches: Vec<Job> = jobs
        .into_iter()
        .filter(|job| job.id.to_string().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        1 => Ok(matches.remove(0)),
        _ => {
            let ids: Vec<String> = matches.iter().map(|job| job.id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_id(id: &str) -> Job {
        let mut job = Job::new("blast", "/tmp/job");
        job.id = Uuid::parse_str(id).unwrap();
        job
    }

    #[test]
    fn test_match_prefix() {
        let jobs = vec![
            job_with_id("0a1b2c3d-0000-4000-8000-000000000001"),
            job_with_id("0a1b9999-0000-4000-8000-000000000002"),
            job_with_id("ffee0000-0000-4000-8000-000000000003"),
        ];

        let job = match_prefix(jobs.clone(), "FFEE").unwrap();
        assert_eq!(job.id.to_string(), "ffee0000-0000-4000-8000-000000000003");

        let err = match_prefix(jobs.clone(), "0a1b").unwrap_err();
        assert!(err.to_string().starts_with("Ambiguous prefix"));

        assert!(match_prefix(jobs, "1234").is_err());
    }
}
