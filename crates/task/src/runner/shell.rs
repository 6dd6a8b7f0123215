use super::{CommandOutcome, CommandRunner};
use crate::cancel::Cancellation;
use async_trait::async_trait;
use ripple_core::{Error, Result, WorkItem, DEFAULT_SHELL};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Runs commands through `sh -c` in the repository root
#[derive(Debug, Clone)]
pub struct ShellRunner {
    root: PathBuf,
    shell: String,
    grace: Duration,
}

impl ShellRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            shell: DEFAULT_SHELL.to_string(),
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// How long a cancelled process gets between SIGTERM and SIGKILL
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, item: &WorkItem, cancel: &Cancellation) -> Result<CommandOutcome> {
        if cancel.is_cancelled() {
            return Ok(CommandOutcome::cancelled());
        }

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&item.command)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so cancellation reaches the whole pipeline
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            Error::command_execution(&item.command, format!("failed to spawn {}: {e}", self.shell), None)
        })?;
        tracing::debug!(item = %item.name, pid = ?child.id(), "command started");

        let stdout = tokio::spawn(last_line(child.stdout.take(), item.name.clone(), "stdout"));
        let stderr = tokio::spawn(last_line(child.stderr.take(), item.name.clone(), "stderr"));

        let status = tokio::select! {
            status = child.wait() => Some(status.map_err(|e| {
                Error::command_execution(&item.command, format!("failed to wait: {e}"), None)
            })?),
            _ = cancel.cancelled() => {
                tracing::warn!(item = %item.name, "cancelling running command");
                terminate(&mut child, self.grace).await;
                None
            }
        };

        let Some(status) = status else {
            stdout.abort();
            stderr.abort();
            return Ok(CommandOutcome::cancelled());
        };

        let out_line = stdout.await.unwrap_or_default();
        let err_line = stderr.await.unwrap_or_default();
        let last = if out_line.is_empty() { err_line } else { out_line };
        Ok(CommandOutcome::finished(exit_code(status), last))
    }
}

/// Drain a stream, logging each line, and keep the last non-empty one
async fn last_line<R>(reader: Option<R>, item: String, stream: &'static str) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };
    let mut lines = BufReader::new(reader).lines();
    let mut last = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(item = %item, stream, "{line}");
        if !line.trim().is_empty() {
            last = line;
        }
    }
    last
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// SIGTERM the process group, then SIGKILL once the grace period lapses
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            signal_group(pid, libc::SIGTERM);
            if tokio::time::timeout(grace, child.wait()).await.is_ok() {
                return;
            }
            tracing::warn!(pid, "command ignored SIGTERM; killing");
            signal_group(pid, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "kill after cancellation failed");
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a stale group only yields ESRCH
    let rc = unsafe { libc::kill(-pid, signal) };
    if rc != 0 {
        tracing::debug!(pid, signal, "signal delivery failed");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn item(command: &str) -> WorkItem {
        WorkItem::new("check", command)
    }

    #[tokio::test]
    async fn test_captures_exit_code_and_last_line() {
        let temp = TempDir::new().unwrap();
        let runner = ShellRunner::new(temp.path());
        let outcome = runner
            .run(&item("echo first; echo last; echo; exit 3"), &Cancellation::new())
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.last_line, "last");
    }

    #[tokio::test]
    async fn test_runs_in_root_and_falls_back_to_stderr() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "x").unwrap();
        let runner = ShellRunner::new(temp.path());
        let outcome = runner
            .run(&item("test -f marker.txt && echo found >&2"), &Cancellation::new())
            .await
            .unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.last_line, "found");
    }

    #[tokio::test]
    async fn test_long_lines_are_truncated() {
        let temp = TempDir::new().unwrap();
        let runner = ShellRunner::new(temp.path());
        let outcome = runner
            .run(&item("printf '%0100d\\n' 0"), &Cancellation::new())
            .await
            .unwrap();
        assert_eq!(outcome.last_line.len(), ripple_core::LAST_LINE_MAX_CHARS);
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_process() {
        let temp = TempDir::new().unwrap();
        let runner = ShellRunner::new(temp.path()).with_grace(Duration::from_millis(200));
        let cancel = Cancellation::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let outcome = runner.run(&item("sleep 30"), &cancel).await.unwrap();
        assert!(outcome.cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_shell_is_an_error() {
        let temp = TempDir::new().unwrap();
        let runner = ShellRunner::new(temp.path()).with_shell("/nonexistent/shell");
        assert!(runner.run(&item("true"), &Cancellation::new()).await.is_err());
    }
}
