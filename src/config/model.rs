// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::monitor::WatchdogConfig;
use crate::types::{ParamValue, RunnerKind};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [project]
/// location = "gh:acme/solvers"
/// parser = "scripts/parse.py"
///
/// [instances]
/// location = "~/instances"
/// classes = ["small", "hard"]
///
/// [run]
/// time_limit = 600
///
/// [[build]]
/// name = "greedy"
/// type = "cpp"
/// build_command = "make greedy"
/// executable = "build/greedy"
/// run_template = "{executable} {instance_path} --seed {seed}"
/// params = { seed = [1, 2, 3] }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    pub project: ProjectSection,

    pub instances: InstancesSection,

    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub monitor: MonitorSection,

    /// All `[[build]]` entries, in file order.
    #[serde(default, rename = "build")]
    pub builds: Vec<BuildConfig>,
}

/// A configuration that passed validation.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: ProjectSection,
    pub instances: InstancesSection,
    pub run: RunSection,
    pub monitor: MonitorSection,
    pub builds: Vec<BuildConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            project: raw.project,
            instances: raw.instances,
            run: raw.run,
            monitor: raw.monitor,
            builds: raw.builds,
        }
    }

    /// Wall-clock budget for one task of `build`.
    pub fn time_limit_for(&self, build: &BuildConfig) -> Duration {
        Duration::from_secs(build.time_limit.unwrap_or(self.run.time_limit))
    }
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Local path, `gh:owner/repo` or any git URL.
    pub location: String,

    /// Script run against every finished task directory.
    #[serde(default)]
    pub parser: Option<PathBuf>,

    /// Directory name used when the project has to be cloned.
    #[serde(default)]
    pub id: Option<String>,
}

/// `[instances]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct InstancesSection {
    pub location: String,

    /// Sub-directories or list files under `location`.
    #[serde(default)]
    pub classes: Vec<String>,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    /// Seconds per task.
    #[serde(default = "default_time_limit")]
    pub time_limit: u64,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Re-run tasks left `pending`, `running` or `failed` by an earlier
    /// campaign instead of skipping them.
    #[serde(default = "default_true")]
    pub retry_interrupted: bool,

    #[serde(default = "default_true")]
    pub pin_cores: bool,

    /// Point `~/last_results.csv` at the newest aggregated table.
    #[serde(default = "default_true")]
    pub link_last_results: bool,
}

fn default_time_limit() -> u64 {
    3600
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("logs/raw")
}

fn default_true() -> bool {
    true
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            time_limit: default_time_limit(),
            output_dir: default_output_dir(),
            retry_interrupted: true,
            pin_cores: true,
            link_last_results: true,
        }
    }
}

/// `[monitor]` section, feeding the memory watchdog.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_threshold_percent")]
    pub threshold_percent: f64,

    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_interval_secs() -> u64 {
    10
}

fn default_threshold_percent() -> f64 {
    80.0
}

fn default_top_n() -> usize {
    5
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            threshold_percent: default_threshold_percent(),
            top_n: default_top_n(),
        }
    }
}

impl From<&MonitorSection> for WatchdogConfig {
    fn from(m: &MonitorSection) -> Self {
        WatchdogConfig {
            interval: Duration::from_secs(m.interval_secs),
            threshold_percent: m.threshold_percent,
            top_n: m.top_n,
        }
    }
}

/// One `[[build]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    pub name: String,

    #[serde(default, rename = "type")]
    pub kind: RunnerKind,

    pub build_command: String,

    /// Path of the built executable, relative to the project root.
    pub executable: PathBuf,

    #[serde(default)]
    pub run_template: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Overrides `[run].time_limit` for this build.
    #[serde(default)]
    pub time_limit: Option<u64>,

    /// Parameter sweep: every combination becomes its own task.
    #[serde(default)]
    pub params: BTreeMap<String, Vec<ParamValue>>,
}

impl BuildConfig {
    /// The explicit `run_template`, or the default for the build type.
    pub fn template_source(&self) -> &str {
        self.run_template
            .as_deref()
            .unwrap_or_else(|| self.kind.default_template())
    }

    #[cfg(test)]
    pub(crate) fn example() -> Self {
        Self {
            name: "solver".to_string(),
            kind: RunnerKind::Cpp,
            build_command: "true".to_string(),
            executable: PathBuf::from("solver"),
            run_template: None,
            description: None,
            time_limit: None,
            params: BTreeMap::new(),
        }
    }
}
