//! Execution results and run summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminal state of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Succeeded,
    /// Restored from the cache or found fresh; the command did not run
    Cached,
    Failed,
    /// Not attempted because a dependency did not succeed
    Skipped,
    Cancelled,
}

impl ItemStatus {
    /// Whether dependents may run after this item
    pub fn is_success(self) -> bool {
        matches!(self, ItemStatus::Succeeded | ItemStatus::Cached)
    }

    /// Whether this item makes the overall exit code non-zero
    pub fn counts_as_failure(self) -> bool {
        !self.is_success()
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ItemStatus::Succeeded => "ok",
            ItemStatus::Cached => "cached",
            ItemStatus::Failed => "failed",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Result of one work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub name: String,
    pub status: ItemStatus,
    pub return_code: i32,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub cached: bool,
    /// Number of times the command was started
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// Diagnostic tail of the command output
    #[serde(default)]
    pub last_output_line: String,
}

impl ExecutionResult {
    /// Result of a command that ran to completion
    pub fn executed(
        name: impl Into<String>,
        return_code: i32,
        duration: Duration,
        attempts: u32,
        last_output_line: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status: if return_code == 0 {
                ItemStatus::Succeeded
            } else {
                ItemStatus::Failed
            },
            return_code,
            duration,
            cached: false,
            attempts,
            cache_key: None,
            last_output_line: last_output_line.into(),
        }
    }

    /// Result of a cache hit: zero duration, return code 0
    pub fn cache_hit(name: impl Into<String>, cache_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Cached,
            return_code: 0,
            duration: Duration::ZERO,
            cached: true,
            attempts: 0,
            cache_key: Some(cache_key.into()),
            last_output_line: "cache hit".to_string(),
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Skipped,
            return_code: -1,
            duration: Duration::ZERO,
            cached: false,
            attempts: 0,
            cache_key: None,
            last_output_line: reason.into(),
        }
    }

    pub fn cancelled(name: impl Into<String>, duration: Duration, attempts: u32) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Cancelled,
            return_code: -1,
            duration,
            cached: false,
            attempts,
            cache_key: None,
            last_output_line: "cancelled".to_string(),
        }
    }

    #[must_use]
    pub fn with_cache_key(mut self, key: Option<String>) -> Self {
        self.cache_key = key;
        self
    }
}

/// Snapshot of one run, overwritten on every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "rc")]
    pub exit_code: i32,
    /// The run stopped early on a failure or cancellation
    #[serde(default)]
    pub aborted: bool,
    pub results: Vec<ExecutionResult>,
}

impl RunSummary {
    pub fn new(
        label: impl Into<String>,
        exit_code: i32,
        aborted: bool,
        results: Vec<ExecutionResult>,
    ) -> Self {
        Self {
            label: label.into(),
            timestamp: Utc::now(),
            exit_code,
            aborted,
            results,
        }
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.status == ItemStatus::Failed)
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Overall exit code: non-zero iff any item failed, was skipped or cancelled
pub fn overall_exit_code(results: &[ExecutionResult]) -> i32 {
    if results.iter().any(|r| r.status.counts_as_failure()) {
        1
    } else {
        0
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executed_status_follows_return_code() {
        let ok = ExecutionResult::executed("a", 0, Duration::from_millis(5), 1, "done");
        assert_eq!(ok.status, ItemStatus::Succeeded);
        let bad = ExecutionResult::executed("b", 3, Duration::from_millis(5), 2, "boom");
        assert_eq!(bad.status, ItemStatus::Failed);
        assert_eq!(bad.attempts, 2);
    }

    #[test]
    fn test_cache_hit_has_zero_duration() {
        let hit = ExecutionResult::cache_hit("a", "abc123");
        assert!(hit.cached);
        assert_eq!(hit.duration, Duration::ZERO);
        assert_eq!(hit.return_code, 0);
        assert!(hit.status.is_success());
    }

    #[test]
    fn test_overall_exit_code_counts_skipped() {
        let results = vec![
            ExecutionResult::cache_hit("a", "k"),
            ExecutionResult::skipped("b", "dependency failed"),
        ];
        assert_eq!(overall_exit_code(&results), 1);
        assert_eq!(overall_exit_code(&results[..1]), 0);
        assert_eq!(overall_exit_code(&[]), 0);
    }

    #[test]
    fn test_summary_serializes_duration_as_seconds() {
        let summary = RunSummary::new(
            "tasks",
            0,
            false,
            vec![ExecutionResult::executed(
                "a",
                0,
                Duration::from_millis(1500),
                1,
                "",
            )],
        );
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["rc"], 0);
        assert_eq!(json["results"][0]["duration"], 1.5);
        assert_eq!(json["results"][0]["status"], "succeeded");

        let back: RunSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back.results[0].duration, Duration::from_millis(1500));
    }
}
