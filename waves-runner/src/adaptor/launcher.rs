//! Job launcher script
//!
//! Every shell and cluster job runs through a small generated script that
//! captures the job output and records when and where it ran, and how it
//! exited, in a run file next to it. Status and run details fall back to
//! that file once a scheduler has forgotten the job.

use std::path::Path;
use waves_core::domain::job::{STDERR_FILE, STDOUT_FILE};

pub const SCRIPT_NAME: &str = ".waves_job.sh";
pub const RUN_FILE: &str = ".waves_run";

/// Starts the script in the background and prints its pid
pub const SPAWN_COMMAND: &str = "nohup sh .waves_job.sh > /dev/null 2>&1 & echo $!";

/// Renders the launcher script for a full command line
///
/// Schedulers start scripts in different places, so a scheduled script first
/// moves to the submission directory exported by the scheduler. Spawned
/// scripts already run in the job directory.
pub fn script(command_line: &str, scheduled: bool) -> String {
    let cd = if scheduled {
        "cd \"${PBS_O_WORKDIR:-${SLURM_SUBMIT_DIR:-${LS_SUBCWD:-.}}}\" || exit 1\n"
    } else {
        ""
    };
    format!(
        r#"#!/bin/sh
{cd}echo "started=$(date -u +%Y-%m-%dT%H:%M:%SZ)" > {run}
echo "host=$(hostname)" >> {run}
{command} > {stdout} 2> {stderr}
code=$?
echo "finished=$(date -u +%Y-%m-%dT%H:%M:%SZ)" >> {run}
echo "exit_code=$code" >> {run}
exit $code
"#,
        cd = cd,
        run = RUN_FILE,
        command = command_line,
        stdout = STDOUT_FILE,
        stderr = STDERR_FILE,
    )
}

/// Prints the launcher state of a spawned script
pub fn status_command(pid: &str) -> String {
    format!(
        r#"state=$(ps -o stat= -p {pid} 2>/dev/null)
if [ -z "$state" ] && kill -0 {pid} 2>/dev/null; then state=R; fi
case "$state" in
  T*) echo SUSPENDED ;;
  ""|Z*) if grep -q '^exit_code=' {run} 2>/dev/null; then echo DONE; else echo FAILED; fi ;;
  *) echo RUNNING ;;
esac"#,
        pid = pid,
        run = RUN_FILE,
    )
}

/// Terminates a spawned script and the command it runs
pub fn cancel_command(pid: &str) -> String {
    format!("pkill -TERM -P {pid} 2>/dev/null; kill -TERM {pid}", pid = pid)
}

/// Content of the run file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecord {
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub host: Option<String>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub exit_code: Option<i32>,
}

impl RunRecord {
    pub fn parse(content: &str) -> Self {
        let mut record = RunRecord::default();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "started" => record.started_at = parse_time(value),
                "host" if !value.is_empty() => record.host = Some(value.to_string()),
                "finished" => record.finished_at = parse_time(value),
                "exit_code" => record.exit_code = value.parse().ok(),
                _ => {}
            }
        }
        record
    }

    /// Reads the run file from a local directory, if it exists
    pub async fn read(dir: &Path) -> std::io::Result<Option<Self>> {
        match tokio::fs::read_to_string(dir.join(RUN_FILE)).await {
            Ok(content) => Ok(Some(Self::parse(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.exit_code.is_some()
    }
}

fn parse_time(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&chrono::Utc))
}
