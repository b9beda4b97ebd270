// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `xp`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "xp",
    version,
    about = "Build solvers, run them over instance sets and gather the results.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `XP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run every build over every instance class of a config file.
    Run(RunArgs),
    /// Run one executable over a list of instances, no config needed.
    Bench(BenchArgs),
    /// Re-run the parser over an existing campaign and aggregate the rows.
    Parse(ParseArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to the campaign config (TOML).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Name of this campaign under the output directory.
    ///
    /// Defaults to the current local time, e.g. `250314_093012`.
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Number of tasks running at once.
    #[arg(short = 'j', long, value_name = "N", default_value_t = 1)]
    pub jobs: usize,

    /// Per-task wall-clock limit in seconds, overriding the config.
    #[arg(long, value_name = "SECONDS")]
    pub time_limit: Option<u64>,

    /// Load and validate, print the plan, but don't build or run anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct BenchArgs {
    #[arg(value_name = "EXECUTABLE")]
    pub executable: PathBuf,

    #[arg(value_name = "INSTANCES", required = true)]
    pub instances: Vec<PathBuf>,

    /// Per-task wall-clock limit in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 3600)]
    pub time_limit: u64,

    /// Number of tasks running at once (default: physical cores).
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct ParseArgs {
    /// Directory holding one sub-directory per task.
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    #[arg(value_name = "PARSER_SCRIPT")]
    pub parser_script: PathBuf,

    /// Parser processes running at once (default: logical CPUs).
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_override_defaults() {
        let args = CliArgs::try_parse_from([
            "xp", "run", "xp.toml", "--tag", "nightly", "-j", "8", "--time-limit", "30",
        ])
        .unwrap();
        let Command::Run(run) = args.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(run.config, PathBuf::from("xp.toml"));
        assert_eq!(run.tag.as_deref(), Some("nightly"));
        assert_eq!(run.jobs, 8);
        assert_eq!(run.time_limit, Some(30));
        assert!(!run.dry_run);
    }

    #[test]
    fn parse_jobs_are_optional() {
        let args = CliArgs::try_parse_from(["xp", "parse", "logs/raw/t", "parse.py"]).unwrap();
        assert!(matches!(args.command, Command::Parse(p) if p.jobs.is_none()));
        let args =
            CliArgs::try_parse_from(["xp", "parse", "logs/raw/t", "parse.py", "-j", "3"]).unwrap();
        assert!(matches!(args.command, Command::Parse(p) if p.jobs == Some(3)));
    }

    #[test]
    fn bench_needs_at_least_one_instance() {
        assert!(CliArgs::try_parse_from(["xp", "bench", "./solver"]).is_err());
        let args =
            CliArgs::try_parse_from(["xp", "--log-level", "debug", "bench", "./solver", "a", "b"])
                .unwrap();
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(matches!(args.command, Command::Bench(b) if b.instances.len() == 2));
    }
}
