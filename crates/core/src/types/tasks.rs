//! Task specifications for the scheduler

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A declared output of a task (file or directory)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub path: PathBuf,
    /// Optional cache-key override; folded into the task fingerprint
    #[serde(default)]
    pub cache_key: Option<String>,
}

impl OutputSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache_key: None,
        }
    }
}

/// A task with its command, declared inputs/outputs and task dependencies.
///
/// `deps` name other tasks, never projects: the task graph is separate from
/// the project graph and, unlike it, must be acyclic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    /// Opaque shell command
    pub command: String,
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub deps: Vec<String>,
}

/// Anything the scheduler runs: a configured task or a project's test target.
pub type WorkItem = TaskSpec;

impl TaskSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            deps: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_inputs<I, P>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_outputs<I, P>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.outputs = outputs.into_iter().map(OutputSpec::new).collect();
        self
    }

    #[must_use]
    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }
}
