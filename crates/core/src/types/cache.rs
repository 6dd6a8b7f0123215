//! Cache and execution modes, and the manifest describing a cache entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How the scheduler uses the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Never consult the cache; always execute
    #[default]
    Off,
    /// Check freshness and the backend before executing; store successes
    ReadWrite,
    /// Only fetch; never execute and never store
    RestoreOnly,
}

impl CacheMode {
    pub fn is_enabled(self) -> bool {
        !matches!(self, CacheMode::Off)
    }

    pub fn can_execute(self) -> bool {
        !matches!(self, CacheMode::RestoreOnly)
    }

    pub fn can_store(self) -> bool {
        matches!(self, CacheMode::ReadWrite)
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::Off => write!(f, "off"),
            CacheMode::ReadWrite => write!(f, "read-write"),
            CacheMode::RestoreOnly => write!(f, "restore-only"),
        }
    }
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "none" | "false" => Ok(CacheMode::Off),
            "local" | "remote" | "read-write" | "readwrite" | "on" | "true" => {
                Ok(CacheMode::ReadWrite)
            }
            "restore-only" | "restore_only" | "read" | "readonly" => Ok(CacheMode::RestoreOnly),
            other => Err(format!(
                "invalid cache mode '{other}' (expected off, local, remote or restore-only)"
            )),
        }
    }
}

/// Serial or bounded-parallel execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Serial,
    /// Bounded worker pool of the given size
    Parallel(usize),
}

impl ExecutionMode {
    /// `0` or `1` worker means serial execution
    pub fn from_workers(workers: usize) -> Self {
        if workers <= 1 {
            ExecutionMode::Serial
        } else {
            ExecutionMode::Parallel(workers)
        }
    }

    pub fn workers(self) -> usize {
        match self {
            ExecutionMode::Serial => 1,
            ExecutionMode::Parallel(n) => n.max(1),
        }
    }
}

/// A stored cache entry, persisted as the manifest next to the archive.
///
/// Entries are never mutated: a new fingerprint always produces a new entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "cache_key")]
    pub key: String,
    pub task: String,
    /// Declared output paths at the time of the store
    pub outputs: Vec<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, task: impl Into<String>, outputs: Vec<PathBuf>) -> Self {
        Self {
            key: key.into(),
            task: task.into(),
            outputs,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_mode_parsing() {
        assert_eq!("off".parse::<CacheMode>().unwrap(), CacheMode::Off);
        assert_eq!("local".parse::<CacheMode>().unwrap(), CacheMode::ReadWrite);
        assert_eq!("remote".parse::<CacheMode>().unwrap(), CacheMode::ReadWrite);
        assert_eq!(
            "restore-only".parse::<CacheMode>().unwrap(),
            CacheMode::RestoreOnly
        );
        assert!("sometimes".parse::<CacheMode>().is_err());
    }

    #[test]
    fn test_cache_mode_capabilities() {
        assert!(!CacheMode::Off.is_enabled());
        assert!(CacheMode::ReadWrite.can_store());
        assert!(!CacheMode::RestoreOnly.can_store());
        assert!(!CacheMode::RestoreOnly.can_execute());
        assert!(CacheMode::Off.can_execute());
    }

    #[test]
    fn test_execution_mode_from_workers() {
        assert_eq!(ExecutionMode::from_workers(0), ExecutionMode::Serial);
        assert_eq!(ExecutionMode::from_workers(1), ExecutionMode::Serial);
        assert_eq!(ExecutionMode::from_workers(4), ExecutionMode::Parallel(4));
        assert_eq!(ExecutionMode::Parallel(0).workers(), 1);
    }
}
