// src/campaign/setup.rs

//! Everything that has to happen before the first task can run: locating
//! the project and instance trees, building executables and expanding
//! instance classes into file lists.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

use crate::config::BuildConfig;
use crate::errors::{Result, XpError};
use crate::fs::FileSystem;

/// Clone target for a remote project without `[project].id`.
pub const PROJECT_CLONE_DIR: &str = "project_root";
/// Clone target for a remote instance repository.
pub const INSTANCES_CLONE_DIR: &str = "inst";

/// Turn a config `location` into a local directory.
///
/// Existing paths are used as-is. Anything else is treated as a git
/// repository (`gh:owner/repo` is shorthand for GitHub) and cloned into
/// `./<default_name>` unless that directory is already there.
pub async fn resolve_location(location: &str, default_name: &str) -> Result<PathBuf> {
    let local = expand_home(location);
    if local.exists() {
        return Ok(local.canonicalize()?);
    }

    let url = repository_url(location);
    let clone_path = PathBuf::from(default_name);
    if clone_path.exists() {
        info!(path = %clone_path.display(), "clone target already present, reusing");
        return Ok(clone_path.canonicalize()?);
    }

    info!(%url, path = %clone_path.display(), "cloning repository");
    let output = Command::new("git")
        .arg("clone")
        .arg(&url)
        .arg(&clone_path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| XpError::ConfigError(format!("cannot run git to clone {url}: {e}")))?;

    if !output.status.success() {
        return Err(XpError::ConfigError(format!(
            "cloning {url} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim_end()
        )));
    }
    Ok(clone_path.canonicalize()?)
}

/// Expand the `gh:` shorthand to a full GitHub URL.
pub fn repository_url(location: &str) -> String {
    match location.strip_prefix("gh:") {
        Some(repo) => format!("https://github.com/{repo}.git"),
        None => location.to_string(),
    }
}

fn expand_home(location: &str) -> PathBuf {
    if let Some(rest) = location.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(location)
}

/// Run every build command inside `project_root` and return the resolved
/// executable of each build, in order.
///
/// The first failing build aborts the whole setup.
pub async fn build_all(builds: &[BuildConfig], project_root: &Path) -> Result<Vec<PathBuf>> {
    let mut executables = Vec::with_capacity(builds.len());

    for build in builds {
        info!(build = %build.name, cmd = %build.build_command, "building");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&build.build_command)
            .current_dir(project_root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| XpError::Build {
                name: build.name.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(XpError::Build {
                name: build.name.clone(),
                detail: format!(
                    "{}\n{}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim_end()
                ),
            });
        }

        let exe = project_root.join(&build.executable);
        if !exe.exists() {
            warn!(build = %build.name, path = %exe.display(), "built executable not found");
        }
        info!(build = %build.name, executable = %exe.display(), "build succeeded");
        executables.push(exe);
    }

    Ok(executables)
}

/// Expand instance classes into instance file lists.
///
/// `<root>/<class>` is either a directory (every file in it is an instance)
/// or a text file naming one instance per line, looked up first in `<root>`
/// and then in `<root>/all`.
pub fn resolve_instances(
    fs: &dyn FileSystem,
    root: &Path,
    classes: &[String],
) -> Result<BTreeMap<String, Vec<PathBuf>>> {
    let mut resolved = BTreeMap::new();

    for class in classes {
        let class_path = root.join(class);
        if !fs.exists(&class_path) {
            return Err(XpError::ConfigError(format!(
                "instance class '{class}' does not exist in {}",
                root.display()
            )));
        }

        let instances = if fs.is_dir(&class_path) {
            fs.read_dir(&class_path)?
                .into_iter()
                .filter(|p| !fs.is_dir(p))
                .collect::<Vec<_>>()
        } else {
            let listing = fs.read_to_string(&class_path)?;
            let mut paths = Vec::new();
            for line in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
                let direct = root.join(line);
                let in_all = root.join("all").join(line);
                if fs.exists(&direct) {
                    paths.push(direct);
                } else if fs.exists(&in_all) {
                    paths.push(in_all);
                } else {
                    return Err(XpError::ConfigError(format!(
                        "instance '{line}' of class '{class}' does not exist"
                    )));
                }
            }
            paths
        };

        info!(class = %class, count = instances.len(), "instance class resolved");
        resolved.insert(class.clone(), instances);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn directory_class_lists_its_files() {
        let fs = MockFileSystem::new();
        fs.add_file("inst/small/b.col", "");
        fs.add_file("inst/small/a.col", "");
        fs.add_dir("inst/small/nested");

        let res = resolve_instances(&fs, Path::new("inst"), &["small".to_string()]).unwrap();
        assert_eq!(
            res["small"],
            vec![PathBuf::from("inst/small/a.col"), PathBuf::from("inst/small/b.col")]
        );
    }

    #[test]
    fn list_file_falls_back_to_all_directory() {
        let fs = MockFileSystem::new();
        fs.add_file("inst/hard", "x.col\n\ny.col\n");
        fs.add_file("inst/x.col", "");
        fs.add_file("inst/all/y.col", "");

        let res = resolve_instances(&fs, Path::new("inst"), &["hard".to_string()]).unwrap();
        assert_eq!(
            res["hard"],
            vec![PathBuf::from("inst/x.col"), PathBuf::from("inst/all/y.col")]
        );
    }

    #[test]
    fn unknown_class_or_instance_is_config_error() {
        let fs = MockFileSystem::new();
        fs.add_file("inst/hard", "missing.col\n");

        assert!(matches!(
            resolve_instances(&fs, Path::new("inst"), &["nope".to_string()]),
            Err(XpError::ConfigError(_))
        ));
        assert!(matches!(
            resolve_instances(&fs, Path::new("inst"), &["hard".to_string()]),
            Err(XpError::ConfigError(msg)) if msg.contains("missing.col")
        ));
    }

    #[test]
    fn gh_shorthand_expands_to_github() {
        assert_eq!(repository_url("gh:acme/solvers"), "https://github.com/acme/solvers.git");
        assert_eq!(repository_url("https://x/y.git"), "https://x/y.git");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_build_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let build = BuildConfig {
            name: "broken".to_string(),
            build_command: "echo nope >&2; exit 1".to_string(),
            executable: PathBuf::from("solver"),
            ..BuildConfig::example()
        };
        match build_all(&[build], dir.path()).await {
            Err(XpError::Build { name, detail }) => {
                assert_eq!(name, "broken");
                assert!(detail.contains("nope"));
            }
            other => panic!("expected build error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn build_resolves_executable_in_project() {
        let dir = tempfile::tempdir().unwrap();
        let build = BuildConfig {
            build_command: "touch solver".to_string(),
            executable: PathBuf::from("solver"),
            ..BuildConfig::example()
        };
        let exes = build_all(&[build], dir.path()).await.unwrap();
        assert_eq!(exes, vec![dir.path().join("solver")]);
        assert!(exes[0].exists());
    }
}
