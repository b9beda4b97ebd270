// src/exec/executor.rs

//! The real process executor.

use std::fs::{self, File};
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use super::backend::ExecutorBackend;
use super::command::wrap_command;
use super::status::{
    self, META_FILE, ResumeDecision, STDERR_FILE, STDOUT_FILE, TaskStatus, write_status,
};
use super::{ExecutionRequest, TIMEOUT_EXIT_CODE, TaskOutcome, TaskReport};
use crate::campaign::parse::parse_task_dir;

/// Knobs shared by every task of a campaign.
#[derive(Debug, Clone, Default)]
pub struct ExecutorSettings {
    /// Re-run tasks whose status file says they were interrupted or failed.
    pub retry_interrupted: bool,
    /// Command run as `<parser> <task dir>` after each finished task.
    pub parser_command: Option<String>,
}

/// Spawns each task through a shell, with stdout/stderr captured to files in
/// the task directory and a wall-clock budget enforced twice: by the
/// external `timeout` wrapper and by the executor itself.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    settings: ExecutorSettings,
    shell: String,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(ExecutorSettings::default())
    }
}

impl ProcessExecutor {
    pub fn new(settings: ExecutorSettings) -> Self {
        let shell = if cfg!(windows) { "cmd" } else { "sh" };
        Self {
            settings,
            shell: shell.to_string(),
        }
    }

    #[cfg(test)]
    fn with_shell(mut self, shell: &str) -> Self {
        self.shell = shell.to_string();
        self
    }

    /// Run one task end to end. Never fails: every problem is logged and
    /// folded into the returned [`TaskReport`].
    pub async fn run(&self, req: ExecutionRequest) -> TaskReport {
        let dir = req.output_dir.clone();

        match status::resume_decision(&dir, self.settings.retry_interrupted) {
            ResumeDecision::Skip => {
                info!(task = %req.name, "output already exists, skipping");
                return TaskReport::Skipped;
            }
            ResumeDecision::Retry(previous) => {
                warn!(
                    task = %req.name,
                    status = %previous,
                    "previous attempt did not finish; clearing directory and re-running"
                );
                if let Err(e) = fs::remove_dir_all(&dir) {
                    return abandon(&req, format!("clearing stale directory: {e}"));
                }
            }
            ResumeDecision::Run => {}
        }

        if let Err(e) = create_task_dir(&dir) {
            return abandon(&req, format!("creating output directory: {e}"));
        }
        if let Err(e) = write_status(&dir, TaskStatus::Pending) {
            return abandon(&req, format!("writing status file: {e}"));
        }

        let full_command = wrap_command(&req.command, req.core, req.time_limit);
        let (exit_code, wall_time_seconds) = match self.spawn_and_wait(&req, &full_command).await {
            Ok(result) => result,
            Err(err) => {
                mark(&dir, TaskStatus::Failed, &req.name);
                return abandon(&req, format!("{err:#}"));
            }
        };

        let outcome = TaskOutcome {
            build_name: req.campaign.clone(),
            instance_name: req.task.instance_name(),
            instance_path: req.task.instance_path.clone(),
            command: full_command,
            wall_time_seconds,
            exit_code,
        };

        if let Err(err) = persist_outcome(&dir, &outcome) {
            error!(
                task = %req.name,
                error = %err,
                "failed to write {META_FILE}; task counted as failed"
            );
            mark(&dir, TaskStatus::Failed, &req.name);
            return TaskReport::PersistFailed {
                outcome,
                error: format!("{err:#}"),
            };
        }
        mark(&dir, TaskStatus::Done, &req.name);

        if let Some(parser) = &self.settings.parser_command {
            if let Err(err) = parse_task_dir(parser, &dir).await {
                warn!(task = %req.name, error = %err, "per-task parser failed");
            }
        }

        TaskReport::Finished(outcome)
    }

    async fn spawn_and_wait(&self, req: &ExecutionRequest, full_command: &str) -> Result<(i32, f64)> {
        let dir = &req.output_dir;
        let stdout = File::create(dir.join(STDOUT_FILE))
            .with_context(|| format!("creating {STDOUT_FILE} for task '{}'", req.name))?;
        let stderr = File::create(dir.join(STDERR_FILE))
            .with_context(|| format!("creating {STDERR_FILE} for task '{}'", req.name))?;

        let mut cmd = shell_command(&self.shell, full_command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        write_status(dir, TaskStatus::Running)
            .with_context(|| format!("writing status for task '{}'", req.name))?;

        info!(
            task = %req.name,
            core = ?req.core,
            time_limit_s = req.time_limit.as_secs_f64(),
            cmd = %full_command,
            "starting task process"
        );

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", req.name))?;

        let waited = tokio::time::timeout(req.time_limit, child.wait()).await;
        let elapsed = started.elapsed().as_secs_f64();

        match waited {
            Ok(status) => {
                let status = status
                    .with_context(|| format!("waiting for process of task '{}'", req.name))?;
                let code = exit_code(status);
                info!(
                    task = %req.name,
                    exit_code = code,
                    wall_time_s = elapsed,
                    timed_out = code == TIMEOUT_EXIT_CODE,
                    "task process exited"
                );
                Ok((code, elapsed))
            }
            Err(_) => {
                warn!(
                    task = %req.name,
                    time_limit_s = req.time_limit.as_secs_f64(),
                    "timeout wrapper did not stop the task in time; killing process group"
                );
                kill_tree(&mut child, &req.name).await;
                Ok((TIMEOUT_EXIT_CODE, req.time_limit.as_secs_f64()))
            }
        }
    }
}

impl ExecutorBackend for ProcessExecutor {
    fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Pin<Box<dyn Future<Output = TaskReport> + Send + '_>> {
        Box::pin(self.run(request))
    }
}

/// Create the task directory; an existing one means two tasks share a name.
fn create_task_dir(dir: &Path) -> io::Result<()> {
    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir(dir)
}

fn persist_outcome(dir: &Path, outcome: &TaskOutcome) -> Result<()> {
    let json = serde_json::to_vec_pretty(outcome).context("serialising task outcome")?;
    status::write_atomic(&dir.join(META_FILE), &json)
        .with_context(|| format!("writing {}", dir.join(META_FILE).display()))
}

fn mark(dir: &Path, status: TaskStatus, task: &str) {
    if let Err(e) = write_status(dir, status) {
        warn!(task = %task, status = %status, error = %e, "failed to update status file");
    }
}

fn abandon(req: &ExecutionRequest, reason: String) -> TaskReport {
    error!(task = %req.name, reason = %reason, "task abandoned");
    TaskReport::Abandoned { reason }
}

/// `<shell> -c <line>`, or `/C` on Windows.
fn shell_command(shell: &str, line: &str) -> Command {
    let flag = if cfg!(windows) { "/C" } else { "-c" };
    let mut c = Command::new(shell);
    c.arg(flag).arg(line);
    c
}

/// Real exit code, or `-signal` for a process killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return -sig;
        }
    }
    -1
}

async fn kill_tree(child: &mut Child, task: &str) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!(task = %task, error = %e, "killpg failed; process group already gone");
            }
        }
    }
    if let Err(e) = child.kill().await {
        debug!(task = %task, error = %e, "child already exited while killing");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::task::TaskDescriptor;
    use std::time::Duration;

    fn request(root: &Path, command: &str, limit: Duration) -> ExecutionRequest {
        let task = TaskDescriptor::new("bin/solver", "inst/a.txt");
        ExecutionRequest {
            name: task.name(),
            campaign: "baseline".to_string(),
            command: command.to_string(),
            core: None,
            time_limit: limit,
            output_dir: root.join(task.name()),
            task,
        }
    }

    #[tokio::test]
    async fn captures_output_and_metadata() {
        let root = tempfile::tempdir().unwrap();
        let req = request(root.path(), "echo out; echo err >&2; exit 3", Duration::from_secs(10));
        let dir = req.output_dir.clone();

        let report = ProcessExecutor::default().run(req).await;

        let outcome = report.outcome().expect("task should finish").clone();
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.wall_time_seconds > 0.0);
        assert_eq!(fs::read_to_string(dir.join(STDOUT_FILE)).unwrap(), "out\n");
        assert_eq!(fs::read_to_string(dir.join(STDERR_FILE)).unwrap(), "err\n");
        assert_eq!(status::read_status(&dir), Some(TaskStatus::Done));

        let meta: TaskOutcome =
            serde_json::from_slice(&fs::read(dir.join(META_FILE)).unwrap()).unwrap();
        assert_eq!(meta, outcome);
        assert_eq!(meta.instance_name, "a.txt");
        assert!(meta.command.starts_with("timeout --kill-after=1s 10s sh -c"));
    }

    #[tokio::test]
    async fn existing_directory_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let req = request(root.path(), "exit 0", Duration::from_secs(5));
        fs::create_dir_all(&req.output_dir).unwrap();

        assert_eq!(ProcessExecutor::default().run(req).await, TaskReport::Skipped);
    }

    #[tokio::test]
    async fn interrupted_run_is_retried() {
        let root = tempfile::tempdir().unwrap();
        let req = request(root.path(), "exit 0", Duration::from_secs(5));
        fs::create_dir_all(&req.output_dir).unwrap();
        write_status(&req.output_dir, TaskStatus::Running).unwrap();

        let report = retrying().run(req).await;
        assert_eq!(report.outcome().map(|o| o.exit_code), Some(0));
    }

    fn retrying() -> ProcessExecutor {
        ProcessExecutor::new(ExecutorSettings {
            retry_interrupted: true,
            parser_command: None,
        })
    }

    #[tokio::test]
    async fn spawn_failure_marks_failed_and_next_run_retries() {
        let root = tempfile::tempdir().unwrap();
        let req = request(root.path(), "exit 0", Duration::from_secs(5));
        let dir = req.output_dir.clone();

        let report = retrying()
            .with_shell("/nonexistent/xp-shell")
            .run(req.clone())
            .await;

        match report {
            TaskReport::Abandoned { reason } => assert!(reason.contains("spawning process")),
            other => panic!("expected an abandoned task, got {other:?}"),
        }
        assert_eq!(status::read_status(&dir), Some(TaskStatus::Failed));
        assert!(!dir.join(META_FILE).exists());

        let report = retrying().run(req).await;
        assert_eq!(report.outcome().map(|o| o.exit_code), Some(0));
        assert_eq!(status::read_status(&dir), Some(TaskStatus::Done));
    }

    #[tokio::test]
    async fn unwritable_metadata_is_persist_failure() {
        let root = tempfile::tempdir().unwrap();
        let task = TaskDescriptor::new("bin/solver", "inst/a.txt");
        let meta = root.path().join(task.name()).join(META_FILE);
        let req = request(
            root.path(),
            &format!("mkdir '{}'; exit 7", meta.display()),
            Duration::from_secs(5),
        );
        let dir = req.output_dir.clone();

        let report = ProcessExecutor::default().run(req).await;

        match report {
            TaskReport::PersistFailed { outcome, error } => {
                assert_eq!(outcome.exit_code, 7);
                assert!(error.contains(META_FILE), "{error}");
            }
            other => panic!("expected a persist failure, got {other:?}"),
        }
        assert_eq!(status::read_status(&dir), Some(TaskStatus::Failed));
        assert!(meta.is_dir());
    }

    #[tokio::test]
    async fn parser_runs_against_task_directory() {
        let root = tempfile::tempdir().unwrap();
        let req = request(root.path(), "exit 0", Duration::from_secs(5));
        let dir = req.output_dir.clone();
        let exec = ProcessExecutor::new(ExecutorSettings {
            retry_interrupted: true,
            parser_command: Some("sh -c 'echo value > \"$0/res.csv\"'".to_string()),
        });

        exec.run(req).await;
        assert_eq!(fs::read_to_string(dir.join("res.csv")).unwrap(), "value\n");
    }
}
