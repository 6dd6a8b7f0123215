//! Persisting the last run's results

use ripple_core::{Error, Result, RunSummary};
use ripple_utils::write_atomic_string;
use std::path::{Path, PathBuf};

/// Destination for run summaries
pub trait ResultSink: Send + Sync {
    fn record(&self, summary: &RunSummary) -> Result<()>;
}

/// Overwrites one JSON file with the latest summary.
///
/// The file is a snapshot, not a log: each run replaces it atomically.
#[derive(Debug, Clone)]
pub struct JsonResultRecorder {
    path: PathBuf,
}

impl JsonResultRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonResultRecorder {
    fn record(&self, summary: &RunSummary) -> Result<()> {
        let json = serde_json::to_string_pretty(summary)?;
        write_atomic_string(&self.path, &json)?;
        tracing::debug!(path = %self.path.display(), results = summary.results.len(), "run recorded");
        Ok(())
    }
}

/// Sink for runs that must not write anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecorder;

impl ResultSink for NullRecorder {
    fn record(&self, _summary: &RunSummary) -> Result<()> {
        Ok(())
    }
}

/// The last recorded summary, `None` if nothing was recorded yet
pub fn load_last_results(path: &Path) -> Result<Option<RunSummary>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::file_system(path, "read last results", e)),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::{ExecutionResult, ItemStatus};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_each_run_overwrites_the_snapshot() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state").join("last_results.json");
        let recorder = JsonResultRecorder::new(&path);

        let first = RunSummary::new(
            "tests",
            1,
            false,
            vec![ExecutionResult::executed("A", 1, Duration::from_secs(1), 1, "boom")],
        );
        recorder.record(&first).unwrap();
        let second = RunSummary::new("tasks", 0, false, vec![ExecutionResult::cache_hit("B", "k")]);
        recorder.record(&second).unwrap();

        let loaded = load_last_results(&path).unwrap().unwrap();
        assert_eq!(loaded.label, "tasks");
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.results[0].status, ItemStatus::Cached);
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(load_last_results(&temp.path().join("none.json")).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("last_results.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(load_last_results(&path).is_err());
    }
}
