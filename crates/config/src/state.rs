//! Persisted CLI state (`.ripple/state.json`)

use ripple_core::Result;
use ripple_utils::write_atomic_string;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliState {
    /// Base ref used by the most recent affected run
    #[serde(default)]
    pub last_base: Option<String>,
    /// Label of the most recent failing run
    #[serde(default)]
    pub last_failed: Option<String>,
}

/// Reads and writes [`CliState`]. With no path (writes disabled) every load
/// returns the default and every save is a no-op.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: Option<PathBuf>,
}

impl StateStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Load state; a missing or unreadable file yields the default state
    pub fn load(&self) -> CliState {
        let Some(path) = &self.path else {
            return CliState::default();
        };
        let Ok(content) = std::fs::read_to_string(path) else {
            return CliState::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt state file");
            CliState::default()
        })
    }

    pub fn save(&self, state: &CliState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(state)?;
        write_atomic_string(path, &content)
    }

    /// Load, modify and save in one step
    pub fn update(&self, f: impl FnOnce(&mut CliState)) -> Result<()> {
        let mut state = self.load();
        f(&mut state);
        self.save(&state)
    }
}
