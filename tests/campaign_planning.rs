// tests/campaign_planning.rs
//
// `xp run` end to end with a local project and instance tree.
#![cfg(unix)]

use std::fs;
use std::path::Path;

use xp::cli::{CliArgs, Command, RunArgs};
use xp::errors::XpError;
use xp_test_utils::init_tracing;

fn write_config(root: &Path, classes: &str) -> std::path::PathBuf {
    let project = root.join("project");
    let instances = root.join("instances");
    fs::create_dir_all(&project).unwrap();

    let config = root.join("xp.toml");
    fs::write(
        &config,
        format!(
            r#"
[project]
location = "{}"

[instances]
location = "{}"
classes = {classes}

[run]
output_dir = "{}"
pin_cores = false

[[build]]
name = "t"
build_command = "true"
executable = "/bin/true"
"#,
            project.display(),
            instances.display(),
            root.join("out").display(),
        ),
    )
    .unwrap();
    config
}

fn run_args(config: std::path::PathBuf) -> CliArgs {
    CliArgs {
        log_level: None,
        command: Command::Run(RunArgs {
            config,
            tag: Some("t1".to_string()),
            jobs: 1,
            time_limit: None,
            dry_run: false,
        }),
    }
}

#[tokio::test]
async fn name_collision_in_any_class_stops_before_first_task() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let inst = root.path().join("instances");
    fs::create_dir_all(inst.join("a")).unwrap();
    fs::create_dir_all(inst.join("b")).unwrap();
    fs::write(inst.join("a").join("x.col"), "").unwrap();
    fs::write(inst.join("b").join("y.col"), "").unwrap();
    fs::write(inst.join("b").join("y.txt"), "").unwrap();
    let config = write_config(root.path(), r#"["a", "b"]"#);

    let err = xp::run(run_args(config)).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<XpError>(),
        Some(XpError::DuplicateTask(name)) if name.starts_with("true_y ")
    ));
    assert!(!root.path().join("out").exists(), "class a ran before the collision was found");
}

#[tokio::test]
async fn every_class_runs_when_names_are_distinct() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let inst = root.path().join("instances");
    fs::create_dir_all(inst.join("a")).unwrap();
    fs::write(inst.join("a").join("x.col"), "").unwrap();
    fs::write(inst.join("x.col"), "").unwrap();
    fs::write(inst.join("b"), "x.col\n").unwrap();
    let config = write_config(root.path(), r#"["a", "b"]"#);

    xp::run(run_args(config)).await.unwrap();

    for class in ["a", "b"] {
        let task = root.path().join("out/t1/t").join(class).join("true_x");
        assert_eq!(fs::read_to_string(task.join("status")).unwrap().trim(), "done");
    }
}
