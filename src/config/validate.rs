// src/config/validate.rs

use std::collections::BTreeSet;

use crate::campaign::INSTANCES_CLONE_DIR;
use crate::config::model::{BuildConfig, ConfigFile, RawConfigFile};
use crate::errors::{Result, XpError};
use crate::task::{CommandTemplate, RESERVED_PLACEHOLDERS, sanitize_component};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::XpError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_builds(cfg)?;
    validate_project(cfg)?;
    validate_instances(cfg)?;
    validate_run_section(cfg)?;
    validate_monitor_section(cfg)?;
    for build in &cfg.builds {
        validate_build(build)?;
    }
    Ok(())
}

fn ensure_has_builds(cfg: &RawConfigFile) -> Result<()> {
    if cfg.builds.is_empty() {
        return Err(XpError::ConfigError(
            "config must contain at least one [[build]] section".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    for build in &cfg.builds {
        if !seen.insert(build.name.as_str()) {
            return Err(XpError::ConfigError(format!(
                "build name '{}' is used more than once",
                build.name
            )));
        }
    }
    Ok(())
}

fn validate_project(cfg: &RawConfigFile) -> Result<()> {
    if let Some(id) = &cfg.project.id {
        if id.trim().is_empty() || sanitize_component(id) != *id {
            return Err(XpError::ConfigError(format!(
                "[project].id {id:?} must only use letters, digits, '.', '_' and '-'"
            )));
        }
        if id == INSTANCES_CLONE_DIR {
            return Err(XpError::ConfigError(format!(
                "[project].id cannot be {INSTANCES_CLONE_DIR:?}, the instance clone directory"
            )));
        }
    }
    Ok(())
}

fn validate_instances(cfg: &RawConfigFile) -> Result<()> {
    if cfg.instances.classes.is_empty() {
        return Err(XpError::ConfigError(
            "[instances].classes must name at least one instance class".to_string(),
        ));
    }
    if let Some(class) = cfg.instances.classes.iter().find(|c| c.trim().is_empty()) {
        return Err(XpError::ConfigError(format!(
            "[instances].classes contains an empty class name ({class:?})"
        )));
    }
    Ok(())
}

fn validate_run_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.run.time_limit == 0 {
        return Err(XpError::ConfigError(
            "[run].time_limit must be >= 1 second (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_monitor_section(cfg: &RawConfigFile) -> Result<()> {
    let m = &cfg.monitor;
    if m.interval_secs == 0 {
        return Err(XpError::ConfigError(
            "[monitor].interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if !(m.threshold_percent > 0.0 && m.threshold_percent <= 100.0) {
        return Err(XpError::ConfigError(format!(
            "[monitor].threshold_percent must be in (0, 100] (got {})",
            m.threshold_percent
        )));
    }
    Ok(())
}

fn validate_build(build: &BuildConfig) -> Result<()> {
    if build.name.is_empty() || sanitize_component(&build.name) != build.name {
        return Err(XpError::ConfigError(format!(
            "build name '{}' must be non-empty and only use [A-Za-z0-9._-]",
            build.name
        )));
    }

    if build.time_limit == Some(0) {
        return Err(XpError::ConfigError(format!(
            "build '{}': time_limit must be >= 1 second (got 0)",
            build.name
        )));
    }

    for (key, values) in &build.params {
        if values.is_empty() {
            return Err(XpError::ConfigError(format!(
                "build '{}': params.{key} must list at least one value",
                build.name
            )));
        }
        if RESERVED_PLACEHOLDERS.contains(&key.as_str()) {
            return Err(XpError::ConfigError(format!(
                "build '{}': '{key}' is reserved and cannot be used as a parameter",
                build.name
            )));
        }
    }

    let template = CommandTemplate::parse(build.template_source())?;

    for placeholder in template.placeholders() {
        let known = RESERVED_PLACEHOLDERS.contains(&placeholder)
            || build.params.contains_key(placeholder);
        if !known {
            return Err(XpError::ConfigError(format!(
                "build '{}': run_template uses {{{placeholder}}}, which is neither \
                 a built-in placeholder nor a key of params",
                build.name
            )));
        }
    }

    Ok(())
}
