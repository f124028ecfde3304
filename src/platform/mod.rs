use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use time::OffsetDateTime;
use wait_timeout::ChildExt;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

const CANCEL_POLL: Duration = Duration::from_millis(100);

pub fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    run_command_cancellable(cmd, args, timeout, None)
}

/// Runs `cmd` to completion, killing it when `timeout` elapses or `cancel`
/// is raised.
pub fn run_command_cancellable(
    cmd: &str,
    args: &[&str],
    timeout: Duration,
    cancel: Option<&AtomicBool>,
) -> Result<CommandOutput> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start process: {cmd}"))?;

    let started = Instant::now();
    let status = loop {
        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            let _ = child.kill();
            let _ = child.wait();
            bail!("timed out after {timeout:?}: {cmd}");
        }
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            let _ = child.kill();
            let _ = child.wait();
            bail!("cancelled: {cmd}");
        }
        if let Some(status) = child
            .wait_timeout(remaining.min(CANCEL_POLL))
            .with_context(|| format!("failed to wait for process: {cmd}"))?
        {
            break status;
        }
    };

    let mut stdout = String::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut stdout);
    }
    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

pub fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME is not set"))
}

pub fn default_data_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".local/share/rescuehub")
}

/// Current time in the local offset, or UTC when the offset cannot be
/// determined (multi-threaded processes on some platforms).
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let out = run_command("sh", &["-c", "echo 40.0,-74.0; exit 3"], Duration::from_secs(5))
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "40.0,-74.0");
    }

    #[test]
    fn kills_the_child_on_timeout() {
        let started = Instant::now();
        let err = run_command("sleep", &["5"], Duration::from_millis(200)).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn raised_cancel_flag_stops_the_child() {
        let cancel = AtomicBool::new(true);
        let err = run_command_cancellable(
            "sleep",
            &["5"],
            Duration::from_secs(5),
            Some(&cancel),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
