// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs one task's command as an isolated subprocess and leaves
//! the per-task filesystem contract behind it:
//!
//! ```text
//! <output_root>/<task name>/
//!     stdout.log  stderr.log  meta.json  status
//! ```
//!
//! - [`affinity`] owns the round-robin [`CoreAllocator`].
//! - [`command`] builds the pinned, timeout-wrapped command line.
//! - [`status`] holds the status file and the resume decision.
//! - [`executor`] is the real [`ProcessExecutor`].
//! - [`backend`] provides the [`ExecutorBackend`] trait the orchestrator talks
//!   to, so tests can swap in a fake executor.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::task::TaskDescriptor;

pub mod affinity;
pub mod backend;
pub mod command;
pub mod executor;
pub mod status;

pub use affinity::CoreAllocator;
pub use backend::ExecutorBackend;
pub use executor::{ExecutorSettings, ProcessExecutor};
pub use status::{ResumeDecision, TaskStatus};

/// Exit code recorded for a task that ran out of time.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Outcome metadata persisted as `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub build_name: String,
    pub instance_name: String,
    pub instance_path: PathBuf,
    pub command: String,
    pub wall_time_seconds: f64,
    pub exit_code: i32,
}

impl TaskOutcome {
    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }
}

/// Everything a backend needs to run one task.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Task directory name.
    pub name: String,
    /// Campaign (build) name recorded in `meta.json`.
    pub campaign: String,
    pub task: TaskDescriptor,
    /// Template output, before pinning and timeout wrapping.
    pub command: String,
    pub core: Option<usize>,
    pub time_limit: Duration,
    pub output_dir: PathBuf,
}

/// What happened to one task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskReport {
    /// Output directory already complete; nothing was spawned.
    Skipped,
    /// The process ran to completion or was stopped by the time limit.
    Finished(TaskOutcome),
    /// The process ran but `meta.json` could not be written.
    PersistFailed { outcome: TaskOutcome, error: String },
    /// Nothing ran to completion (bad template, spawn failure, ...).
    Abandoned { reason: String },
}

impl TaskReport {
    pub fn outcome(&self) -> Option<&TaskOutcome> {
        match self {
            TaskReport::Finished(o) | TaskReport::PersistFailed { outcome: o, .. } => Some(o),
            _ => None,
        }
    }
}
