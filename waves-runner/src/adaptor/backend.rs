//! Execution backend
//!
//! Composes a [`Transport`] with an optional [`QueueDescriptor`]. Without a
//! queue, jobs are spawned directly through the launcher script; with one,
//! the launcher script is submitted to the scheduler.

use async_trait::async_trait;
use waves_core::domain::{Job, JobRunDetails, JobStatus};

use super::AdaptorBackend;
use super::error::AdaptorError;
use super::launcher::{self, RunRecord};
use super::queue::QueueDescriptor;
use super::status::SHELL_STATES;
use super::transport::Transport;
use tracing::debug;

pub struct ExecutionBackend {
    transport: Box<dyn Transport>,
    queue: Option<Box<dyn QueueDescriptor>>,
}

impl ExecutionBackend {
    pub fn new(transport: Box<dyn Transport>, queue: Option<Box<dyn QueueDescriptor>>) -> Self {
        Self { transport, queue }
    }

    fn remote_id(job: &Job) -> Result<&str, AdaptorError> {
        job.remote_job_id
            .as_deref()
            .ok_or_else(|| AdaptorError::job(format!("job {} has no remote job id", job.id)))
    }

    /// Status from the run file when the scheduler has forgotten the job
    async fn status_from_run_file(&self, job: &Job) -> Result<JobStatus, AdaptorError> {
        let dir = self.transport.job_dir(job);
        let output = self
            .transport
            .exec(&format!("cat {} 2>/dev/null", launcher::RUN_FILE), &dir)
            .await?;
        let record = RunRecord::parse(&output.stdout);
        Ok(if record.is_finished() {
            JobStatus::Completed
        } else {
            JobStatus::Undefined
        })
    }
}

#[async_trait]
impl AdaptorBackend for ExecutionBackend {
    fn host(&self) -> &str {
        self.transport.host()
    }

    fn port(&self) -> Option<u16> {
        self.transport.port()
    }

    async fn connect(&mut self) -> Result<(), AdaptorError> {
        self.transport.connect().await
    }

    async fn disconnect(&mut self) -> Result<(), AdaptorError> {
        self.transport.disconnect().await
    }

    async fn prepare(&mut self, job: &Job, command_line: &str) -> Result<(), AdaptorError> {
        tokio::fs::create_dir_all(&job.working_directory).await?;

        let mut files = vec![(
            launcher::SCRIPT_NAME.to_string(),
            launcher::script(command_line, self.queue.is_some()),
        )];
        if let Some(queue) = &self.queue {
            files.extend(queue.submit_files(job));
        }

        let mut staged = job.input_files().map_err(AdaptorError::job)?;
        for (name, content) in files {
            tokio::fs::write(job.working_directory.join(&name), content).await?;
            staged.push(name);
        }

        self.transport.upload(job, &staged).await
    }

    async fn run(&mut self, job: &Job) -> Result<String, AdaptorError> {
        let dir = self.transport.job_dir(job);

        match &self.queue {
            Some(queue) => {
                let output = self
                    .transport
                    .exec(&queue.submit_command(job), &dir)
                    .await?
                    .check(&format!("{} submission", queue.name()))?;
                queue.parse_submit(&output.stdout)
            }
            None => {
                let output = self
                    .transport
                    .exec(launcher::SPAWN_COMMAND, &dir)
                    .await?
                    .check("job spawn")?;
                let pid = output.stdout.trim();
                if pid.is_empty() || !pid.chars().all(|c| c.is_ascii_digit()) {
                    return Err(AdaptorError::job(format!(
                        "unexpected spawn output: '{}'",
                        pid
                    )));
                }
                Ok(pid.to_string())
            }
        }
    }

    async fn cancel(&mut self, job: &Job) -> Result<(), AdaptorError> {
        let remote_id = Self::remote_id(job)?;
        let dir = self.transport.job_dir(job);
        let command = match &self.queue {
            Some(queue) => queue.cancel_command(remote_id),
            None => launcher::cancel_command(remote_id),
        };
        self.transport.exec(&command, &dir).await?.check("cancel")?;
        Ok(())
    }

    async fn status(&mut self, job: &Job) -> Result<JobStatus, AdaptorError> {
        let remote_id = Self::remote_id(job)?;
        let dir = self.transport.job_dir(job);

        match &self.queue {
            Some(queue) => {
                let output = self
                    .transport
                    .exec(&queue.status_command(remote_id), &dir)
                    .await?;
                match queue.parse_status(&output.stdout) {
                    Some(native) => {
                        debug!("Job {} is '{}' in {}", job.id, native, queue.name());
                        Ok(queue.states().map(&native))
                    }
                    None => self.status_from_run_file(job).await,
                }
            }
            None => {
                let output = self
                    .transport
                    .exec(&launcher::status_command(remote_id), &dir)
                    .await?
                    .check("status query")?;
                Ok(SHELL_STATES.map(&output.stdout))
            }
        }
    }

    async fn results(&mut self, job: &Job) -> Result<i32, AdaptorError> {
        self.transport.download(job).await?;

        RunRecord::read(&job.working_directory)
            .await?
            .and_then(|record| record.exit_code)
            .ok_or_else(|| AdaptorError::job("run record has no exit code"))
    }

    async fn run_details(&mut self, job: &Job) -> Result<Option<JobRunDetails>, AdaptorError> {
        let Some(record) = RunRecord::read(&job.working_directory).await? else {
            return Ok(None);
        };

        let mut details = JobRunDetails::from_job(job);
        details.started_at = record.started_at.or(details.started_at);
        details.finished_at = record.finished_at.or(details.finished_at);
        details.exit_code = record.exit_code.or(details.exit_code);
        details.execution_hosts = record.host.into_iter().collect();
        Ok(Some(details))
    }
}
