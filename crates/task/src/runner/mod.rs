//! Command adapters
//!
//! The scheduler only sees [`CommandRunner`]. Which adapter runs commands is
//! decided once at startup from the configuration.

mod mock;
mod shell;

pub use mock::{MockEvent, MockRunner};
pub use shell::ShellRunner;

use crate::cancel::Cancellation;
use async_trait::async_trait;
use ripple_config::Adapter;
use ripple_core::{Result, WorkItem, LAST_LINE_MAX_CHARS};
use std::path::Path;
use std::sync::Arc;

/// How one command invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub exit_code: i32,
    /// Last non-empty output line, truncated for display
    pub last_line: String,
    /// The process was stopped by cancellation
    pub cancelled: bool,
}

impl CommandOutcome {
    pub fn finished(exit_code: i32, last_line: impl AsRef<str>) -> Self {
        Self {
            exit_code,
            last_line: truncate_line(last_line.as_ref()),
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            exit_code: -1,
            last_line: "cancelled".to_string(),
            cancelled: true,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.cancelled
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the item's command once. `Err` means it could not be started.
    async fn run(&self, item: &WorkItem, cancel: &Cancellation) -> Result<CommandOutcome>;
}

/// The runner selected by `adapter`, executing inside `root`
pub fn runner_for(adapter: Adapter, root: &Path) -> Arc<dyn CommandRunner> {
    match adapter {
        Adapter::Shell => Arc::new(ShellRunner::new(root)),
        Adapter::Mock => Arc::new(MockRunner::new()),
    }
}

/// Trim and cut a line to at most [`LAST_LINE_MAX_CHARS`] characters
pub fn truncate_line(line: &str) -> String {
    line.trim().chars().take(LAST_LINE_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_line_counts_chars() {
        assert_eq!(truncate_line("  ok \n"), "ok");
        let long = "é".repeat(100);
        assert_eq!(truncate_line(&long).chars().count(), LAST_LINE_MAX_CHARS);
    }

    #[test]
    fn test_outcome_success() {
        assert!(CommandOutcome::finished(0, "done").success());
        assert!(!CommandOutcome::finished(2, "boom").success());
        assert!(!CommandOutcome::cancelled().success());
    }
}
