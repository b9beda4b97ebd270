// src/task/descriptor.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::template::{CommandTemplate, TemplateError};
use crate::errors::XpError;
use crate::types::ParamValue;

/// Placeholder names every task provides on its own.
pub const RESERVED_PLACEHOLDERS: [&str; 2] = ["executable", "instance_path"];

/// One (executable, instance, parameters) unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub executable: PathBuf,
    pub instance_path: PathBuf,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl TaskDescriptor {
    pub fn new(executable: impl Into<PathBuf>, instance_path: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            instance_path: instance_path.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Directory key for this task's results.
    ///
    /// `<executable stem>_<instance stem>` followed by `_<key>_<value>` for
    /// each parameter in key order, reduced to filesystem-safe characters.
    pub fn name(&self) -> String {
        let mut name = format!(
            "{}_{}",
            stem_of(&self.executable),
            stem_of(&self.instance_path)
        );
        for (key, value) in &self.params {
            name.push('_');
            name.push_str(key);
            name.push('_');
            name.push_str(&value.to_string());
        }
        sanitize_component(&name)
    }

    /// File name of the instance, as recorded in `meta.json`.
    pub fn instance_name(&self) -> String {
        self.instance_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.instance_path.display().to_string())
    }

    /// Values available to a run template for this task.
    ///
    /// The built-in `executable` and `instance_path` always win over a
    /// parameter of the same name.
    pub fn template_values(&self) -> BTreeMap<String, String> {
        let mut values: BTreeMap<String, String> = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        values.insert(
            "executable".to_string(),
            self.executable.display().to_string(),
        );
        values.insert(
            "instance_path".to_string(),
            self.instance_path.display().to_string(),
        );
        values
    }

    pub fn render(&self, template: &CommandTemplate) -> Result<String, TemplateError> {
        template.render(&self.template_values())
    }
}

/// Expand a parameter sweep into one descriptor per combination.
///
/// An empty `params` map yields exactly one descriptor. A key with an empty
/// value list yields no descriptors at all.
pub fn sweep(
    executable: &Path,
    instance_path: &Path,
    params: &BTreeMap<String, Vec<ParamValue>>,
) -> Vec<TaskDescriptor> {
    let mut out = vec![TaskDescriptor::new(executable, instance_path)];
    for (key, choices) in params {
        out = out
            .into_iter()
            .flat_map(|base| {
                choices
                    .iter()
                    .map(move |v| base.clone().with_param(key, v.clone()))
            })
            .collect();
    }
    out
}

/// Fail when two tasks would write to the same directory.
pub fn check_unique(tasks: &[TaskDescriptor]) -> Result<(), XpError> {
    let mut seen: BTreeMap<String, &TaskDescriptor> = BTreeMap::new();
    for task in tasks {
        let name = task.name();
        if let Some(first) = seen.get(&name) {
            return Err(XpError::DuplicateTask(format!(
                "{name} ({} and {} map to the same directory)",
                first.instance_path.display(),
                task.instance_path.display()
            )));
        }
        seen.insert(name, task);
    }
    Ok(())
}

/// Replace everything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{cleaned}"),
        _ => cleaned,
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_joins_executable_instance_and_params() {
        let task = TaskDescriptor::new("build/solver", "inst/g1.col").with_param("depth", 3);
        assert_eq!(task.name(), "solver_g1_depth_3");
        assert_eq!(task.instance_name(), "g1.col");
    }

    #[test]
    fn name_is_filesystem_safe() {
        let task = TaskDescriptor::new("solver", "a b.txt").with_param("mode", "x/y");
        assert_eq!(task.name(), "solver_a_b_mode_x_y");
    }

    #[test]
    fn builtin_values_shadow_params() {
        let task = TaskDescriptor::new("solver", "i.txt").with_param("executable", "evil");
        assert_eq!(task.template_values()["executable"], "solver");
    }

    #[test]
    fn sweep_builds_cartesian_product() {
        let mut params = BTreeMap::new();
        params.insert("depth".to_string(), vec![ParamValue::from(1), ParamValue::from(2)]);
        params.insert("seed".to_string(), vec![ParamValue::from(7), ParamValue::from(8)]);
        let tasks = sweep(Path::new("s"), Path::new("i"), &params);
        let names: Vec<String> = tasks.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "s_i_depth_1_seed_7",
                "s_i_depth_1_seed_8",
                "s_i_depth_2_seed_7",
                "s_i_depth_2_seed_8",
            ]
        );
    }

    #[test]
    fn same_stem_with_different_extension_collides() {
        let tasks = vec![
            TaskDescriptor::new("solver", "b/y.col"),
            TaskDescriptor::new("solver", "b/y.txt"),
        ];
        let err = check_unique(&tasks).unwrap_err();
        assert!(matches!(err, XpError::DuplicateTask(msg) if msg.starts_with("solver_y ")));
        assert!(check_unique(&tasks[..1]).is_ok());
    }

    #[test]
    fn sweep_without_params_is_single_task() {
        assert_eq!(sweep(Path::new("s"), Path::new("i"), &BTreeMap::new()).len(), 1);
    }
}
