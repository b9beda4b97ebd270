// src/exec/status.rs

//! Per-task status file and the resume decision built on it.
//!
//! Every task directory carries a one-word `status` file that moves through
//! `pending → running → done | failed`. Both the status and `meta.json` are
//! written through a temp file plus rename, so readers never see a torn
//! write.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

pub const STATUS_FILE: &str = "status";
pub const META_FILE: &str = "meta.json";
pub const STDOUT_FILE: &str = "stdout.log";
pub const STDERR_FILE: &str = "stderr.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// What to do with a task given the state of its output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    /// No directory yet.
    Run,
    /// Finished earlier (or a directory without a status file).
    Skip,
    /// Interrupted or failed earlier; clear the directory and run again.
    Retry(TaskStatus),
}

pub fn resume_decision(dir: &Path, retry_interrupted: bool) -> ResumeDecision {
    if !dir.exists() {
        return ResumeDecision::Run;
    }
    match read_status(dir) {
        None | Some(TaskStatus::Done) => ResumeDecision::Skip,
        Some(status) if retry_interrupted => ResumeDecision::Retry(status),
        Some(_) => ResumeDecision::Skip,
    }
}

/// Status recorded in `dir`, if any (unreadable or unknown counts as none).
pub fn read_status(dir: &Path) -> Option<TaskStatus> {
    fs::read_to_string(dir.join(STATUS_FILE))
        .ok()
        .and_then(|s| s.parse().ok())
}

pub fn write_status(dir: &Path, status: TaskStatus) -> io::Result<()> {
    write_atomic(&dir.join(STATUS_FILE), status.as_str().as_bytes())
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
