// src/lib.rs

pub mod campaign;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod monitor;
pub mod task;
pub mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::campaign::{
    CsvAggregation, INSTANCES_CLONE_DIR, PROJECT_CLONE_DIR, build_all, parse_and_gather,
    parser_command, resolve_instances, resolve_location,
};
use crate::cli::{BenchArgs, CliArgs, Command, ParseArgs, RunArgs};
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::engine::{CampaignReport, Orchestrator, RunConfig};
use crate::exec::affinity::physical_cores;
use crate::exec::{CoreAllocator, ProcessExecutor};
use crate::fs::RealFileSystem;
use crate::monitor::WatchdogConfig;
use crate::task::{CommandTemplate, TaskDescriptor, check_unique, sweep};
use crate::types::RunnerKind;

/// Where `xp bench` writes its task directories.
pub const BENCH_OUTPUT_DIR: &str = "logs/raw";
/// Aggregated table written by `xp parse`.
pub const PARSED_RESULTS_FILE: &str = "parsed_results.csv";

/// High-level entry point used by `main.rs`.
///
/// Every setup step (config, clone, build, instance resolution) runs before
/// the first task, so any error here exits the tool before work starts.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Run(run) => run_campaigns(run).await,
        Command::Bench(bench) => run_bench(bench).await,
        Command::Parse(parse) => run_parse(parse).await,
    }
}

async fn run_campaigns(args: RunArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;

    if args.jobs == 0 {
        bail!("--jobs must be >= 1");
    }
    if args.time_limit == Some(0) {
        bail!("--time-limit must be >= 1 second");
    }
    let tag = args.tag.clone().unwrap_or_else(default_tag);

    if args.dry_run {
        print_dry_run(&cfg, &args, &tag);
        return Ok(());
    }

    let project_dir = cfg.project.id.as_deref().unwrap_or(PROJECT_CLONE_DIR);
    let project_root = resolve_location(&cfg.project.location, project_dir).await?;
    let executables = build_all(&cfg.builds, &project_root).await?;

    let instances_root = resolve_location(&cfg.instances.location, INSTANCES_CLONE_DIR).await?;
    let instances = resolve_instances(&RealFileSystem, &instances_root, &cfg.instances.classes)?;

    let parser = cfg
        .project
        .parser
        .as_deref()
        .map(parser_command)
        .transpose()?;

    let campaigns = plan_campaigns(&cfg, &args, &tag, &executables, &instances, parser)?;

    let cores = if cfg.run.pin_cores {
        CoreAllocator::detect().cores().to_vec()
    } else {
        Vec::new()
    };

    for campaign in campaigns {
        let name = campaign.config.name.clone();
        let has_parser = campaign.config.parser_command.is_some();
        let executor = ProcessExecutor::new(campaign.config.executor_settings());
        let mut orchestrator = Orchestrator::new(campaign.config, campaign.tasks, executor)?
            .with_allocator(CoreAllocator::new(cores.clone()));
        if has_parser {
            orchestrator =
                orchestrator.with_hook(Box::new(CsvAggregation::new(cfg.run.link_last_results)));
        }

        let report = orchestrator.run().await?;
        log_report(&name, Some(campaign.class.as_str()), &report);
    }

    Ok(())
}

/// One (build × class) campaign, ready to hand to an orchestrator.
#[derive(Debug)]
pub struct PlannedCampaign {
    pub class: String,
    pub config: RunConfig,
    pub tasks: Vec<TaskDescriptor>,
}

/// Expand every (build × class) pair into its task list.
///
/// Every list is checked for colliding task names here, so a bad pair
/// fails the whole run before the first campaign starts.
pub fn plan_campaigns(
    cfg: &ConfigFile,
    args: &RunArgs,
    tag: &str,
    executables: &[PathBuf],
    instances: &BTreeMap<String, Vec<PathBuf>>,
    parser: Option<String>,
) -> Result<Vec<PlannedCampaign>> {
    let mut campaigns = Vec::new();

    for (build, executable) in cfg.builds.iter().zip(executables) {
        let template = CommandTemplate::parse(build.template_source())?;
        let time_limit = args
            .time_limit
            .map(Duration::from_secs)
            .unwrap_or_else(|| cfg.time_limit_for(build));

        for class in &cfg.instances.classes {
            let Some(paths) = instances.get(class) else {
                continue;
            };
            let tasks: Vec<TaskDescriptor> = paths
                .iter()
                .flat_map(|inst| sweep(executable, inst, &build.params))
                .collect();
            if tasks.is_empty() {
                warn!(build = %build.name, class = %class, "no instances in class, skipping");
                continue;
            }
            check_unique(&tasks)
                .with_context(|| format!("build '{}', class '{class}'", build.name))?;

            campaigns.push(PlannedCampaign {
                class: class.clone(),
                config: RunConfig {
                    name: build.name.clone(),
                    output_root: output_root_for(&cfg.run.output_dir, tag, &build.name, class),
                    time_limit,
                    workers: args.jobs,
                    template: template.clone(),
                    class_name: Some(class.clone()),
                    parser_command: parser.clone(),
                    retry_interrupted: cfg.run.retry_interrupted,
                    watchdog: WatchdogConfig::from(&cfg.monitor),
                },
                tasks,
            });
        }
    }

    debug!(campaigns = campaigns.len(), "campaigns planned");
    Ok(campaigns)
}

async fn run_bench(args: BenchArgs) -> Result<()> {
    if args.time_limit == 0 {
        bail!("--time-limit must be >= 1 second");
    }
    if args.jobs == Some(0) {
        bail!("--jobs must be >= 1");
    }
    let executable = args
        .executable
        .canonicalize()
        .with_context(|| format!("executable not found: {}", args.executable.display()))?;

    let kind = if executable.extension().is_some_and(|e| e == "py") {
        RunnerKind::Python
    } else {
        RunnerKind::Exe
    };
    let name = executable
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bench".to_string());

    let config = RunConfig {
        name: name.clone(),
        output_root: PathBuf::from(BENCH_OUTPUT_DIR),
        time_limit: Duration::from_secs(args.time_limit),
        workers: args.jobs.unwrap_or_else(default_workers),
        template: CommandTemplate::parse(kind.default_template())?,
        class_name: None,
        parser_command: None,
        retry_interrupted: true,
        watchdog: WatchdogConfig::default(),
    };
    let tasks = args
        .instances
        .iter()
        .map(|inst| TaskDescriptor::new(&executable, inst))
        .collect();

    let executor = ProcessExecutor::new(config.executor_settings());
    let report = Orchestrator::new(config, tasks, executor)?
        .with_allocator(CoreAllocator::detect())
        .run()
        .await?;
    log_report(&name, None, &report);
    Ok(())
}

async fn run_parse(args: ParseArgs) -> Result<()> {
    if args.jobs == Some(0) {
        bail!("--jobs must be >= 1");
    }
    let jobs = args.jobs.unwrap_or_else(available_cpus);
    let parser = parser_command(&args.parser_script)?;
    let dest = args.input_dir.join(PARSED_RESULTS_FILE);
    let summary = parse_and_gather(&args.input_dir, &parser, &dest, jobs, true).await?;

    info!(
        parsed = summary.parsed,
        failed = summary.failed,
        rows = summary.rows,
        file = %dest.display(),
        "parse finished"
    );
    Ok(())
}

fn log_report(name: &str, class: Option<&str>, report: &CampaignReport) {
    info!(
        campaign = %name,
        class = class.unwrap_or("-"),
        total = report.total,
        finished = report.finished,
        timed_out = report.timed_out,
        skipped = report.skipped,
        abandoned = report.abandoned,
        "campaign complete"
    );
}

/// Local time as `%y%m%d_%H%M%S`.
pub fn default_tag() -> String {
    chrono::Local::now().format("%y%m%d_%H%M%S").to_string()
}

/// Physical cores, falling back to logical CPUs, at least 1.
pub fn default_workers() -> usize {
    physical_cores()
        .map(|cores| cores.len())
        .filter(|n| *n > 0)
        .unwrap_or_else(available_cpus)
}

/// Logical CPUs, at least 1.
pub fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Print the plan: builds, classes, output roots and limits.
fn print_dry_run(cfg: &ConfigFile, args: &RunArgs, tag: &str) {
    println!("xp dry-run");
    println!("  project.location = {}", cfg.project.location);
    if let Some(parser) = &cfg.project.parser {
        println!("  project.parser = {}", parser.display());
    }
    println!("  instances.location = {}", cfg.instances.location);
    println!("  instances.classes = {:?}", cfg.instances.classes);
    println!("  jobs = {}", args.jobs);
    println!("  tag = {tag}");
    println!();

    println!("builds ({}):", cfg.builds.len());
    for build in &cfg.builds {
        let limit = args
            .time_limit
            .map(Duration::from_secs)
            .unwrap_or_else(|| cfg.time_limit_for(build));
        println!("  - {}", build.name);
        if let Some(desc) = &build.description {
            println!("      description: {desc}");
        }
        println!("      build: {}", build.build_command);
        println!("      executable: {}", build.executable.display());
        println!("      run: {}", build.template_source());
        println!("      time_limit: {}s", limit.as_secs());
        if !build.params.is_empty() {
            let combos: usize = build.params.values().map(Vec::len).product();
            println!("      params: {} combination(s) per instance", combos);
            for (key, values) in &build.params {
                let shown: Vec<String> = values.iter().map(ToString::to_string).collect();
                println!("        {key} = [{}]", shown.join(", "));
            }
        }
        for class in &cfg.instances.classes {
            println!(
                "      -> {}",
                output_root_for(&cfg.run.output_dir, tag, &build.name, class).display()
            );
        }
    }

    debug!("dry-run complete (no execution)");
}

fn output_root_for(output_dir: &Path, tag: &str, build: &str, class: &str) -> PathBuf {
    output_dir.join(tag).join(build).join(class)
}
