// tests/error_handling.rs

use std::io::Write;
use tempfile::NamedTempFile;
use xp::config::load_and_validate;
use xp::errors::XpError;
use xp::task::TemplateError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

const HEAD: &str = r#"
[project]
location = "."

[instances]
location = "instances"
classes = ["small"]
"#;

#[test]
fn test_missing_file_is_config_error() {
    let result = load_and_validate("/definitely/not/here/xp.toml");
    assert!(matches!(result, Err(XpError::ConfigError(msg)) if msg.contains("cannot read config")));
}

#[test]
fn test_malformed_toml_returns_toml_error() {
    let file = config_file("[project\nlocation = ");
    assert!(matches!(load_and_validate(file.path()), Err(XpError::TomlError(_))));
}

#[test]
fn test_unknown_build_type_returns_toml_error() {
    let file = config_file(&format!(
        r#"{HEAD}
[[build]]
name = "a"
type = "java"
build_command = "make"
executable = "a.out"
"#
    ));
    assert!(matches!(load_and_validate(file.path()), Err(XpError::TomlError(_))));
}

#[test]
fn test_unclosed_placeholder_is_rejected() {
    let file = config_file(&format!(
        r#"{HEAD}
[[build]]
name = "a"
build_command = "make"
executable = "a.out"
run_template = "{{executable}} {{instance_path"
"#
    ));
    match load_and_validate(file.path()) {
        Err(XpError::Template(TemplateError::Malformed { template, .. })) => {
            assert_eq!(template, "{executable} {instance_path")
        }
        other => panic!("expected a malformed template error, got {other:?}"),
    }
}

#[test]
fn test_unsafe_build_name_is_rejected() {
    let file = config_file(&format!(
        r#"{HEAD}
[[build]]
name = "../escape"
build_command = "make"
executable = "a.out"
"#
    ));
    assert!(matches!(load_and_validate(file.path()), Err(XpError::ConfigError(_))));
}

#[test]
fn test_empty_param_list_is_rejected() {
    let file = config_file(&format!(
        r#"{HEAD}
[[build]]
name = "a"
build_command = "make"
executable = "a.out"
run_template = "{{executable}} {{instance_path}} -s {{seed}}"
params = {{ seed = [] }}
"#
    ));
    assert!(matches!(
        load_and_validate(file.path()),
        Err(XpError::ConfigError(msg)) if msg.contains("params.seed")
    ));
}

#[test]
fn test_full_config_loads() {
    let file = config_file(
        r#"
[project]
location = "gh:acme/solvers"
parser = "scripts/parse.py"
id = "solvers"

[instances]
location = "~/instances"
classes = ["small", "hard"]

[run]
time_limit = 600
output_dir = "results"
pin_cores = false

[monitor]
interval_secs = 5
threshold_percent = 90.0

[[build]]
name = "greedy"
type = "cpp"
build_command = "make greedy"
executable = "build/greedy"
run_template = "{executable} {instance_path} --seed {seed} --fast {fast}"
time_limit = 60
params = { seed = [1, 2, 3], fast = [true, false] }

[[build]]
name = "exact"
type = "python"
build_command = "true"
executable = "exact.py"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.builds.len(), 2);
    assert_eq!(cfg.time_limit_for(&cfg.builds[0]).as_secs(), 60);
    assert_eq!(cfg.time_limit_for(&cfg.builds[1]).as_secs(), 600);
    assert!(cfg.builds[1].template_source().starts_with("python3 "));
    assert!(!cfg.run.pin_cores);
    assert!(cfg.run.retry_interrupted);
    assert_eq!(cfg.monitor.top_n, 5);
}
