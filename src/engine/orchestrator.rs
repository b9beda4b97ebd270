// src/engine/orchestrator.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::report::{CampaignReport, CampaignSummary, ConsoleReporter, Reporter, TaskProgress};
use super::{CampaignHook, CampaignPhase, RunConfig};
use crate::errors::{Result, XpError};
use crate::exec::{CoreAllocator, ExecutionRequest, ExecutorBackend, TaskReport};
use crate::monitor::{MemoryProbe, SysinfoProbe, Watchdog};
use crate::task::{TaskDescriptor, check_unique};

/// Drives one campaign through a bounded worker pool.
///
/// Every task is submitted up front. Cores are handed out at submission, in
/// task order, so the first `workers` tasks land on distinct cores. Each
/// worker then waits for a pool slot before formatting its command and
/// calling the executor.
pub struct Orchestrator<E: ExecutorBackend> {
    config: RunConfig,
    tasks: Vec<(String, TaskDescriptor)>,
    executor: Arc<E>,
    allocator: CoreAllocator,
    reporter: Arc<dyn Reporter>,
    probe: Option<Box<dyn MemoryProbe>>,
    hook: Option<Box<dyn CampaignHook>>,
    phase: CampaignPhase,
}

impl<E: ExecutorBackend> fmt::Debug for Orchestrator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("campaign", &self.config.name)
            .field("tasks", &self.tasks.len())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Orchestrator<E> {
    /// Validate the campaign and take ownership of its tasks.
    ///
    /// Fails on an empty task list, a zero-sized pool, or two tasks that
    /// would write to the same directory.
    pub fn new(config: RunConfig, tasks: Vec<TaskDescriptor>, executor: E) -> Result<Self> {
        if tasks.is_empty() {
            return Err(XpError::EmptyCampaign);
        }
        if config.workers == 0 {
            return Err(XpError::ConfigError(
                "worker count must be >= 1 (got 0)".to_string(),
            ));
        }

        check_unique(&tasks)?;
        let tasks: Vec<(String, TaskDescriptor)> =
            tasks.into_iter().map(|t| (t.name(), t)).collect();

        Ok(Self {
            config,
            tasks,
            executor: Arc::new(executor),
            allocator: CoreAllocator::disabled(),
            reporter: Arc::new(ConsoleReporter),
            probe: None,
            hook: None,
            phase: CampaignPhase::Created,
        })
    }

    pub fn with_allocator(mut self, allocator: CoreAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_hook(mut self, hook: Box<dyn CampaignHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn phase(&self) -> CampaignPhase {
        self.phase
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every task, then the hook, and return the totals.
    ///
    /// Only a failure to create the output root is an error; per-task
    /// problems end up in the report.
    pub async fn run(mut self) -> Result<CampaignReport> {
        self.enter(CampaignPhase::PrintingSummary);
        self.reporter.summary(&CampaignSummary {
            name: self.config.name.clone(),
            class_name: self.config.class_name.clone(),
            workers: self.config.workers,
            time_limit: self.config.time_limit,
            output_root: self.config.output_root.clone(),
            task_count: self.tasks.len(),
        });

        tokio::fs::create_dir_all(&self.config.output_root).await?;

        self.enter(CampaignPhase::Running);
        let probe = self
            .probe
            .take()
            .unwrap_or_else(|| Box::new(SysinfoProbe::new()));
        let watchdog = Watchdog::spawn(probe, self.config.watchdog.clone());

        let mut report = self.drain_tasks().await;

        self.enter(CampaignPhase::Aggregating);
        if let Some(hook) = self.hook.take() {
            run_hook(hook, self.config.output_root.clone()).await;
        }

        report.watchdog = watchdog.stop().await;
        self.enter(CampaignPhase::Done);

        self.reporter.finished(&report);
        Ok(report)
    }

    fn enter(&mut self, next: CampaignPhase) {
        debug!(campaign = %self.config.name, from = %self.phase, to = %next, "phase change");
        self.phase = next;
    }

    async fn drain_tasks(&mut self) -> CampaignReport {
        let total = self.tasks.len();
        let pool = Arc::new(Semaphore::new(self.config.workers));
        let template = Arc::new(self.config.template.clone());
        let campaign: Arc<str> = Arc::from(self.config.name.as_str());
        let mut set = JoinSet::new();

        info!(
            campaign = %self.config.name,
            tasks = total,
            workers = self.config.workers,
            pinned = self.allocator.is_enabled(),
            "submitting tasks"
        );

        for (name, task) in std::mem::take(&mut self.tasks) {
            let core = self.allocator.next_core();
            let pool = Arc::clone(&pool);
            let template = Arc::clone(&template);
            let campaign = Arc::clone(&campaign);
            let executor = Arc::clone(&self.executor);
            let output_dir = self.config.output_root.join(&name);
            let time_limit = self.config.time_limit;

            set.spawn(async move {
                let Ok(_slot) = pool.acquire_owned().await else {
                    let reason = "worker pool closed".to_string();
                    return (name, TaskReport::Abandoned { reason });
                };

                let command = match task.render(&template) {
                    Ok(command) => command,
                    Err(e) => {
                        error!(task = %name, error = %e, "cannot format command");
                        let reason = e.to_string();
                        return (name, TaskReport::Abandoned { reason });
                    }
                };

                let request = ExecutionRequest {
                    name: name.clone(),
                    campaign: campaign.to_string(),
                    task,
                    command,
                    core,
                    time_limit,
                    output_dir,
                };
                let report = executor.execute(request).await;
                (name, report)
            });
        }

        let mut report = CampaignReport {
            total,
            ..CampaignReport::default()
        };

        while let Some(joined) = set.join_next().await {
            let (name, task_report) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "worker terminated abnormally");
                    let reason = format!("worker failed: {e}");
                    ("<unknown>".to_string(), TaskReport::Abandoned { reason })
                }
            };
            report.record(&task_report);
            self.reporter.progress(&TaskProgress {
                completed: report.drained(),
                total,
                task: &name,
                report: &task_report,
            });
        }

        report
    }
}

async fn run_hook(hook: Box<dyn CampaignHook>, root: PathBuf) {
    let joined = tokio::task::spawn_blocking(move || {
        let result = hook.run(&root);
        (hook.name().to_string(), result)
    })
    .await;

    match joined {
        Ok((name, Ok(()))) => info!(hook = %name, "post-campaign hook finished"),
        Ok((name, Err(e))) => warn!(hook = %name, error = %e, "post-campaign hook failed"),
        Err(e) => error!(error = %e, "post-campaign hook panicked"),
    }
}
