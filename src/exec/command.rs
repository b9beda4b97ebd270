// src/exec/command.rs

//! Final shell command line for a task: optional core pinning plus the
//! external `timeout` wrapper.

use std::time::Duration;

/// Lower bound on the SIGTERM → SIGKILL grace period.
pub const MIN_KILL_GRACE: Duration = Duration::from_secs(1);

/// Grace period between the graceful and the forced kill: 1% of the limit,
/// never below [`MIN_KILL_GRACE`].
pub fn kill_grace(time_limit: Duration) -> Duration {
    (time_limit / 100).max(MIN_KILL_GRACE)
}

/// Wrap a rendered command so it is pinned to `core` (if any) and terminated
/// once `time_limit` elapses.
///
/// The rendered command runs inside its own `sh -c`, so redirections and
/// `;`-chains in a template stay under the wrapper.
pub fn wrap_command(rendered: &str, core: Option<usize>, time_limit: Duration) -> String {
    let mut cmd = String::new();
    if let Some(core) = core {
        cmd.push_str(&format!("taskset -c {core} "));
    }
    cmd.push_str(&format!(
        "timeout --kill-after={}s {}s sh -c {}",
        format_secs(kill_grace(time_limit)),
        format_secs(time_limit),
        shell_quote(rendered)
    ));
    cmd
}

/// Quote `s` as a single POSIX shell word.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn format_secs(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        d.as_secs().to_string()
    } else {
        let s = format!("{:.3}", d.as_secs_f64());
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_is_one_percent_with_floor() {
        assert_eq!(kill_grace(Duration::from_secs(3600)), Duration::from_secs(36));
        assert_eq!(kill_grace(Duration::from_secs(10)), MIN_KILL_GRACE);
    }

    #[test]
    fn pinned_command_has_taskset_prefix() {
        let cmd = wrap_command("./solver a.txt", Some(3), Duration::from_secs(60));
        assert_eq!(
            cmd,
            "taskset -c 3 timeout --kill-after=1s 60s sh -c './solver a.txt'"
        );
    }

    #[test]
    fn unpinned_command_only_has_timeout() {
        let cmd = wrap_command("true", None, Duration::from_millis(1500));
        assert_eq!(cmd, "timeout --kill-after=1s 1.5s sh -c 'true'");
    }

    #[test]
    fn single_quotes_survive_quoting() {
        assert_eq!(shell_quote("echo 'hi'"), r#"'echo '\''hi'\'''"#);
    }
}
