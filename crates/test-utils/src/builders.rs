use std::path::{Path, PathBuf};
use std::time::Duration;

use xp::engine::RunConfig;
use xp::monitor::WatchdogConfig;
use xp::task::{CommandTemplate, TaskDescriptor};

/// Shorthand for a parameterless task.
pub fn task(executable: &str, instance: &str) -> TaskDescriptor {
    TaskDescriptor::new(executable, instance)
}

/// Builder for `RunConfig` with test-friendly defaults: two workers, a
/// five-second limit and a fast watchdog.
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn new(output_root: impl AsRef<Path>) -> Self {
        Self {
            config: RunConfig {
                name: "solver".to_string(),
                output_root: PathBuf::from(output_root.as_ref()),
                time_limit: Duration::from_secs(5),
                workers: 2,
                template: CommandTemplate::parse("{executable} {instance_path}")
                    .expect("default template"),
                class_name: None,
                parser_command: None,
                retry_interrupted: true,
                watchdog: WatchdogConfig {
                    interval: Duration::from_millis(50),
                    ..WatchdogConfig::default()
                },
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.config.time_limit = limit;
        self
    }

    pub fn template(mut self, source: &str) -> Self {
        self.config.template = CommandTemplate::parse(source).expect("valid test template");
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.config.class_name = Some(class.to_string());
        self
    }

    pub fn parser(mut self, cmd: &str) -> Self {
        self.config.parser_command = Some(cmd.to_string());
        self
    }

    pub fn retry_interrupted(mut self, val: bool) -> Self {
        self.config.retry_interrupted = val;
        self
    }

    pub fn watchdog_interval(mut self, interval: Duration) -> Self {
        self.config.watchdog.interval = interval;
        self
    }

    pub fn build(self) -> RunConfig {
        self.config
    }
}
