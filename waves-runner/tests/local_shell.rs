//! End-to-end runs on the local shell adaptor

mod common;

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::lifecycle;
use waves_core::domain::{CmdFormat, Job, JobStatus, ParamDescriptor, ParamType};
use waves_runner::adaptor::AdaptorRegistry;
use waves_runner::config::Config;
use waves_runner::crypto::Cipher;
use waves_runner::repository::{FsJobRepository, JobRepository};
use waves_runner::scheduler::JobQueueDaemon;
use waves_runner::service::{LifecycleService, StandardLifecycleService};

const MAX_POLLS: usize = 100;

fn echo_job(work: &std::path::Path) -> Job {
    Job::new("echo", work).with_input(
        ParamDescriptor::new("message", CmdFormat::Posix).with_value("hello"),
        ParamType::Text,
    )
}

#[tokio::test]
async fn test_local_run() {
    let root = tempfile::tempdir().unwrap();
    let (service, _) = lifecycle(root.path(), 5);
    let mut adaptor = AdaptorRegistry::builtin()
        .create("local-shell", [("command", "echo")])
        .unwrap();

    let work = root.path().join("work");
    let mut job = echo_job(&work);

    service.prepare(&mut job, &mut adaptor).await.unwrap();
    assert_eq!(job.status(), JobStatus::Prepared);
    service.launch(&mut job, &mut adaptor).await.unwrap();
    assert_eq!(job.status(), JobStatus::Queued);
    assert!(job.remote_job_id.is_some());

    let mut polls = 0;
    while job.status() < JobStatus::Completed {
        assert!(polls < MAX_POLLS, "job did not complete");
        tokio::time::sleep(Duration::from_millis(50)).await;
        service.poll_status(&mut job, &mut adaptor).await.unwrap();
        polls += 1;
    }

    service.fetch_results(&mut job, &mut adaptor).await.unwrap();
    adaptor.disconnect().await.unwrap();

    assert_eq!(job.status(), JobStatus::Finished);
    assert_eq!(job.exit_code, Some(0));
    assert!(job.results_available);
    assert_eq!(adaptor.command_line(&mut job), "echo hello");
    assert_eq!(std::fs::read_to_string(job.stdout_path()).unwrap(), "hello\n");

    let details = adaptor.job_run_details(&job).await.unwrap();
    assert_eq!(details.exit_code, Some(0));
    assert!(details.started_at.is_some());
}

#[tokio::test]
async fn test_failing_command_ends_in_error() {
    let root = tempfile::tempdir().unwrap();
    let (service, _) = lifecycle(root.path(), 5);
    let mut adaptor = AdaptorRegistry::builtin()
        .create("local-shell", [("command", "ls")])
        .unwrap();

    let mut job = Job::new("ls", root.path().join("work")).with_input(
        ParamDescriptor::new("path", CmdFormat::Posix).with_value("does-not-exist"),
        ParamType::Text,
    );

    let mut steps = 0;
    while !job.status().is_terminal() {
        assert!(steps < MAX_POLLS, "job did not end");
        service.step(&mut job, &mut adaptor).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        steps += 1;
    }

    assert_eq!(job.status(), JobStatus::Error);
    assert_ne!(job.exit_code, Some(0));
    assert_eq!(job.message.as_deref(), Some("Error detected in job.stderr"));
}

#[tokio::test]
async fn test_input_values_are_not_run_by_the_shell() {
    let root = tempfile::tempdir().unwrap();
    let (service, _) = lifecycle(root.path(), 5);
    let mut adaptor = AdaptorRegistry::builtin()
        .create("local-shell", [("command", "echo")])
        .unwrap();

    let work = root.path().join("work");
    let mut job = Job::new("echo", &work).with_input(
        ParamDescriptor::new("message", CmdFormat::Posix).with_value("hello; touch OWNED"),
        ParamType::Text,
    );

    let mut steps = 0;
    while !job.status().is_terminal() {
        assert!(steps < MAX_POLLS, "job did not end");
        service.step(&mut job, &mut adaptor).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        steps += 1;
    }
    adaptor.disconnect().await.unwrap();

    assert_eq!(job.status(), JobStatus::Finished);
    assert_eq!(
        std::fs::read_to_string(job.stdout_path()).unwrap(),
        "hello; touch OWNED\n"
    );
    assert!(!work.join("OWNED").exists());
}

#[tokio::test]
async fn test_daemon_drives_stored_jobs() {
    let root = tempfile::tempdir().unwrap();
    let repository = Arc::new(FsJobRepository::new(root.path()));
    let registry = Arc::new(AdaptorRegistry::builtin());
    let cipher = Cipher::random();

    let adaptor = registry
        .create("local-shell", [("command", "echo")])
        .unwrap();
    let mut job = echo_job(root.path());
    job.working_directory = repository.job_dir(job.id);
    job.adaptor_config = Some(adaptor.serialize(&cipher));
    repository.save_job(&job).await.unwrap();

    let lifecycle: Arc<dyn LifecycleService> =
        Arc::new(StandardLifecycleService::new(repository.clone(), 5));
    let daemon = JobQueueDaemon::new(
        &Config::new(root.path()),
        repository.clone(),
        lifecycle,
        registry,
        cipher,
        CancellationToken::new(),
    );

    let first = daemon.tick().await.unwrap();
    assert_eq!(first.processed, 1);
    assert_eq!(first.advanced, 1);
    let stored = repository.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), JobStatus::Prepared);

    let mut ticks = 1;
    loop {
        let stored = repository.get_job(job.id).await.unwrap().unwrap();
        if stored.status().is_terminal() {
            assert_eq!(stored.status(), JobStatus::Finished);
            assert_eq!(stored.exit_code, Some(0));
            break;
        }
        assert!(ticks < MAX_POLLS, "job did not finish");
        tokio::time::sleep(Duration::from_millis(50)).await;
        daemon.tick().await.unwrap();
        ticks += 1;
    }

    assert_eq!(daemon.tick().await.unwrap().processed, 0);
}
