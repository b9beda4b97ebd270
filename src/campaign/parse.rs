// src/campaign/parse.rs

//! Per-task parser invocation.
//!
//! A parser is an external program that receives one task directory as its
//! only argument and leaves a `res.csv` row behind in it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::aggregate::gather_results;
use crate::errors::{Result, XpError};
use crate::exec::command::shell_quote;

/// Work out how to invoke a parser script.
///
/// Executable files run directly, `.py` scripts through `uv run --script`.
pub fn parser_command(script: &Path) -> Result<String> {
    if !script.exists() {
        return Err(XpError::ConfigError(format!(
            "parser script not found: {}",
            script.display()
        )));
    }
    let script = script.canonicalize()?;
    let quoted = shell_quote(&script.display().to_string());

    if is_executable(&script) {
        Ok(quoted)
    } else if script.extension().is_some_and(|ext| ext == "py") {
        Ok(format!("uv run --script {quoted}"))
    } else {
        Err(XpError::ConfigError(format!(
            "don't know how to run parser {} (not executable, not a .py script)",
            script.display()
        )))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "exe")
}

/// Run `<parser_cmd> <dir>` and wait for it.
///
/// Output is only surfaced when the parser exits non-zero.
pub async fn parse_task_dir(parser_cmd: &str, dir: &Path) -> anyhow::Result<()> {
    let line = format!("{parser_cmd} {}", shell_quote(&dir.display().to_string()));
    let output = Command::new("sh")
        .arg("-c")
        .arg(&line)
        .output()
        .await
        .with_context(|| format!("running parser on {}", dir.display()))?;

    if output.status.success() {
        debug!(dir = %dir.display(), "parser finished");
        return Ok(());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        info!(dir = %dir.display(), "parser stdout:\n{}", stdout.trim_end());
    }
    Err(anyhow!(
        "parser exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim_end()
    ))
}

/// Counts from a [`parse_and_gather`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    pub parsed: usize,
    pub failed: usize,
    pub rows: usize,
}

/// Run the parser over every task directory under `raw_dir` with at most
/// `jobs` parsers in flight, then aggregate all `res.csv` files into
/// `dest_csv`.
pub async fn parse_and_gather(
    raw_dir: &Path,
    parser_cmd: &str,
    dest_csv: &Path,
    jobs: usize,
    link_last: bool,
) -> Result<ParseSummary> {
    let dirs: Vec<PathBuf> = std::fs::read_dir(raw_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    info!(count = dirs.len(), dir = %raw_dir.display(), "parsing task directories");

    let limit = Arc::new(Semaphore::new(jobs.max(1)));
    let parser: Arc<str> = Arc::from(parser_cmd);
    let mut set = JoinSet::new();
    for dir in dirs {
        let limit = Arc::clone(&limit);
        let parser = Arc::clone(&parser);
        set.spawn(async move {
            let _permit = limit.acquire_owned().await;
            let res = parse_task_dir(&parser, &dir).await;
            (dir, res)
        });
    }

    let mut summary = ParseSummary::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Ok(()))) => summary.parsed += 1,
            Ok((dir, Err(err))) => {
                summary.failed += 1;
                error!(dir = %dir.display(), error = %err, "parser failed");
            }
            Err(e) => {
                summary.failed += 1;
                error!(error = %e, "parser worker panicked");
            }
        }
    }

    summary.rows = match gather_results(raw_dir, dest_csv, link_last) {
        Ok(rows) => rows,
        Err(err) => {
            warn!(error = %err, "aggregation failed");
            0
        }
    };
    Ok(summary)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn python_scripts_run_through_uv() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("parser.py");
        std::fs::write(&script, "print('x')").unwrap();

        let cmd = parser_command(&script).unwrap();
        assert!(cmd.starts_with("uv run --script '"));
    }

    #[test]
    fn executable_scripts_run_directly() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("parse.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cmd = parser_command(&script).unwrap();
        assert!(cmd.ends_with("parse.sh'"));
        assert!(!cmd.contains("uv run"));
    }

    #[test]
    fn unknown_parser_kind_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("parser.txt");
        std::fs::write(&script, "").unwrap();

        assert!(matches!(parser_command(&script), Err(XpError::ConfigError(_))));
        assert!(matches!(
            parser_command(&dir.path().join("missing.py")),
            Err(XpError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn failing_parser_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_task_dir("sh -c 'echo broken >&2; exit 2'", dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn parse_and_gather_collects_rows() {
        let raw = tempfile::tempdir().unwrap();
        for name in ["t1", "t2"] {
            std::fs::create_dir(raw.path().join(name)).unwrap();
        }
        let dest = raw.path().join("parsed_results.csv");
        let parser = "sh -c 'printf \"time\\n1.5\\n\" > \"$0/res.csv\"'";

        let summary = parse_and_gather(raw.path(), parser, &dest, 2, false)
            .await
            .unwrap();

        assert_eq!(summary.parsed, 2);
        assert_eq!(summary.rows, 2);
        let csv = std::fs::read_to_string(&dest).unwrap();
        assert!(csv.starts_with("time,instance_name\n"));
    }
}
