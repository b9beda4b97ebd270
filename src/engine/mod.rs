// src/engine/mod.rs

//! Campaign orchestration.
//!
//! One [`Orchestrator`] runs one campaign: a fixed list of task descriptors
//! for a single build and instance class. It moves through
//! [`CampaignPhase`]s in order:
//!
//! ```text
//! Created -> PrintingSummary -> Running -> Aggregating -> Done
//! ```
//!
//! The memory watchdog runs for the whole of `Running` and `Aggregating`
//! and has been joined by the time [`Orchestrator::run`] returns.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exec::ExecutorSettings;
use crate::monitor::WatchdogConfig;
use crate::task::CommandTemplate;

pub mod orchestrator;
pub mod report;

pub use orchestrator::Orchestrator;
pub use report::{CampaignReport, CampaignSummary, ConsoleReporter, Reporter, TaskProgress};

/// Work run once over the whole output root after every task has drained.
///
/// Hooks are best-effort: an error is logged and the campaign still
/// completes.
pub trait CampaignHook: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn run(&self, output_root: &Path) -> anyhow::Result<()>;
}

/// Immutable settings of one campaign.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Campaign name, recorded as `build_name` in every `meta.json`.
    pub name: String,
    pub output_root: PathBuf,
    pub time_limit: Duration,
    /// Maximum number of tasks running at once.
    pub workers: usize,
    pub template: CommandTemplate,
    /// Instance class label, shown in the summary panel.
    pub class_name: Option<String>,
    pub parser_command: Option<String>,
    pub retry_interrupted: bool,
    pub watchdog: WatchdogConfig,
}

impl RunConfig {
    /// Settings for a [`ProcessExecutor`](crate::exec::ProcessExecutor)
    /// serving this campaign.
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            retry_interrupted: self.retry_interrupted,
            parser_command: self.parser_command.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignPhase {
    Created,
    PrintingSummary,
    Running,
    Aggregating,
    Done,
}

impl fmt::Display for CampaignPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CampaignPhase::Created => "created",
            CampaignPhase::PrintingSummary => "printing-summary",
            CampaignPhase::Running => "running",
            CampaignPhase::Aggregating => "aggregating",
            CampaignPhase::Done => "done",
        };
        f.write_str(s)
    }
}
