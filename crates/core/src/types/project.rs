use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A project from the registry.
///
/// Projects are loaded once per invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project name
    pub name: String,
    /// Filesystem root of the project, relative to the repository root
    pub path: PathBuf,
    /// Names of projects this one depends on
    #[serde(default)]
    pub deps: Vec<String>,
    /// Test locations, relative to the repository root
    #[serde(default)]
    pub tests: Vec<String>,
    /// Optional run target
    #[serde(default)]
    pub run: Option<Vec<String>>,
    #[serde(default)]
    pub description: String,
    /// Free-form project kind (`engine`, `host`, `tool`, ...)
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
}

fn default_kind() -> String {
    "misc".to_string()
}

impl Project {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            deps: Vec::new(),
            tests: Vec::new(),
            run: None,
            description: String::new(),
            kind: default_kind(),
        }
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

    #[must_use]
    pub fn with_tests<I, S>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tests = tests.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the project declares any tests
    pub fn has_tests(&self) -> bool {
        !self.tests.is_empty()
    }

    /// The project root as a forward-slash string without a trailing slash.
    ///
    /// Changed paths reported by git always use `/`, so matching is done on
    /// this normalized form.
    pub fn root_prefix(&self) -> String {
        let raw = self.path.to_string_lossy().replace('\\', "/");
        let trimmed = raw.trim_start_matches("./").trim_end_matches('/');
        trimmed.to_string()
    }
}
