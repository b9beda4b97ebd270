// src/engine/report.rs

//! User-facing campaign output.
//!
//! The orchestrator never prints on its own; it hands summaries and progress
//! to an injected [`Reporter`]. [`ConsoleReporter`] is the production one.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::exec::TaskReport;
use crate::monitor::WatchdogStats;

const PANEL_WIDTH: usize = 74;

/// What is about to run.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSummary {
    pub name: String,
    pub class_name: Option<String>,
    pub workers: usize,
    pub time_limit: Duration,
    pub output_root: PathBuf,
    pub task_count: usize,
}

/// One task has drained from the pool.
#[derive(Debug, Clone, Copy)]
pub struct TaskProgress<'a> {
    pub completed: usize,
    pub total: usize,
    pub task: &'a str,
    pub report: &'a TaskReport,
}

/// Totals for a finished campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignReport {
    pub total: usize,
    /// Ran to completion, including timeouts.
    pub finished: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub abandoned: usize,
    pub persist_failed: usize,
    /// `None` if the watchdog loop died before the campaign ended.
    pub watchdog: Option<WatchdogStats>,
}

impl CampaignReport {
    pub(crate) fn record(&mut self, report: &TaskReport) {
        match report {
            TaskReport::Skipped => self.skipped += 1,
            TaskReport::Finished(outcome) => {
                self.finished += 1;
                if outcome.timed_out() {
                    self.timed_out += 1;
                }
            }
            TaskReport::PersistFailed { .. } => self.persist_failed += 1,
            TaskReport::Abandoned { .. } => self.abandoned += 1,
        }
    }

    /// Number of tasks accounted for so far.
    pub fn drained(&self) -> usize {
        self.finished + self.skipped + self.abandoned + self.persist_failed
    }
}

pub trait Reporter: Send + Sync {
    fn summary(&self, summary: &CampaignSummary);
    fn progress(&self, progress: &TaskProgress<'_>);
    fn finished(&self, report: &CampaignReport);
}

/// Prints the summary panel on stdout and logs progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn summary(&self, summary: &CampaignSummary) {
        println!("{}", render_panel(summary));
    }

    fn progress(&self, p: &TaskProgress<'_>) {
        match p.report {
            TaskReport::Skipped => {
                info!(task = %p.task, done = p.completed, total = p.total, "skipped")
            }
            TaskReport::Finished(o) if o.timed_out() => warn!(
                task = %p.task,
                done = p.completed,
                total = p.total,
                wall_s = o.wall_time_seconds,
                "timed out"
            ),
            TaskReport::Finished(o) => info!(
                task = %p.task,
                done = p.completed,
                total = p.total,
                exit_code = o.exit_code,
                wall_s = o.wall_time_seconds,
                "finished"
            ),
            TaskReport::PersistFailed { error: e, .. } => error!(
                task = %p.task,
                done = p.completed,
                total = p.total,
                error = %e,
                "finished but metadata was not saved"
            ),
            TaskReport::Abandoned { reason } => error!(
                task = %p.task,
                done = p.completed,
                total = p.total,
                %reason,
                "abandoned"
            ),
        }
    }

    fn finished(&self, r: &CampaignReport) {
        println!(
            "Done: {} finished ({} timed out), {} skipped, {} abandoned, {} unsaved",
            r.finished, r.timed_out, r.skipped, r.abandoned, r.persist_failed
        );
    }
}

/// The boxed panel shown before a campaign starts.
pub fn render_panel(s: &CampaignSummary) -> String {
    let title = match &s.class_name {
        Some(class) => format!("Running {} × {}", s.name, class),
        None => format!("Running {}", s.name),
    };
    let rows = [
        title,
        String::new(),
        format!("  Workers:          {}", s.workers),
        format!("  Time Limit:       {}s", s.time_limit.as_secs()),
        format!("  Raw Logs:         {}", s.output_root.display()),
        format!("  # of Instances:   {}", s.task_count),
        String::new(),
        "Sit back and wait...".to_string(),
    ];

    let inner = PANEL_WIDTH - 4;
    let rule = format!("+{}+", "-".repeat(PANEL_WIDTH - 2));
    let mut out = String::new();
    out.push_str(&rule);
    out.push('\n');
    for row in rows {
        let pad = inner.saturating_sub(row.chars().count());
        out.push_str(&format!("| {row}{} |\n", " ".repeat(pad)));
    }
    out.push_str(&rule);
    out
}
