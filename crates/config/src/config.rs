//! Centralized runtime configuration for ripple
//!
//! `RuntimeConfig` is the single source of truth for paths and settings. It is
//! built once by [`crate::ConfigLoader`] and passed by reference to every
//! component; nothing mutates it afterwards.

use ripple_core::{
    Error, Project, Result, DEFAULT_BASE_REF, DEFAULT_TEST_COMMAND, LAST_RESULTS_FILENAME,
    STATE_FILENAME,
};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How work item commands are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adapter {
    /// Run commands through the system shell
    #[default]
    Shell,
    /// Log commands and report success without running anything
    Mock,
}

impl FromStr for Adapter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shell" | "sh" => Ok(Adapter::Shell),
            "mock" | "dry-run" => Ok(Adapter::Mock),
            other => Err(Error::configuration(format!(
                "unknown adapter '{other}' (expected 'shell' or 'mock')"
            ))),
        }
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adapter::Shell => write!(f, "shell"),
            Adapter::Mock => write!(f, "mock"),
        }
    }
}

/// Overrides collected from the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub root: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub registry: Option<PathBuf>,
    pub cache_url: Option<String>,
    pub adapter: Option<Adapter>,
    pub parallel: Option<usize>,
    pub retries: Option<u32>,
    pub no_write: bool,
}

/// Immutable configuration shared by all commands
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Repository root; every relative path resolves against it
    pub root: PathBuf,
    /// Config file that was loaded, if any
    pub config_file: Option<PathBuf>,
    pub registry_path: PathBuf,
    /// File holding `[tasks.<name>]` tables
    pub tasks_path: Option<PathBuf>,
    /// `None` when writes are disabled
    pub state_dir: Option<PathBuf>,
    /// `None` when writes are disabled
    pub cache_dir: Option<PathBuf>,
    /// Remote cache location (`http(s)://...` or `s3://bucket/prefix`)
    pub cache_url: Option<String>,
    pub adapter: Adapter,
    /// Template with `{name}`, `{path}` and `{tests}` placeholders
    pub test_command: String,
    /// Alias name to task name
    pub task_aliases: BTreeMap<String, String>,
    pub default_base: String,
    /// Worker count; `1` runs serially
    pub parallel: usize,
    pub retries: u32,
    pub no_write: bool,
}

impl RuntimeConfig {
    /// Configuration rooted at `root` with every default applied
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            registry_path: root.join(ripple_core::DEFAULT_REGISTRY_FILENAME),
            state_dir: Some(root.join(ripple_core::DEFAULT_STATE_DIR)),
            cache_dir: Some(root.join(ripple_core::DEFAULT_CACHE_DIR)),
            config_file: None,
            tasks_path: None,
            cache_url: None,
            adapter: Adapter::default(),
            test_command: DEFAULT_TEST_COMMAND.to_string(),
            task_aliases: BTreeMap::new(),
            default_base: DEFAULT_BASE_REF.to_string(),
            parallel: 1,
            retries: 0,
            no_write: false,
            root,
        }
    }

    /// Resolve a possibly relative path against the repository root
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        resolve_against(&self.root, path.as_ref())
    }

    /// Where the last run summary is recorded
    pub fn last_results_path(&self) -> Option<PathBuf> {
        self.state_dir
            .as_ref()
            .map(|dir| dir.join(LAST_RESULTS_FILENAME))
    }

    /// Where CLI state (last base ref) is persisted
    pub fn state_file_path(&self) -> Option<PathBuf> {
        self.state_dir.as_ref().map(|dir| dir.join(STATE_FILENAME))
    }

    /// Look a task name up through the alias table
    pub fn resolve_task_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.task_aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    /// Render the test command for a project, or `None` if it has no tests
    pub fn test_command_for(&self, project: &Project) -> Option<String> {
        if !project.has_tests() {
            return None;
        }
        let tests = shlex::try_join(project.tests.iter().map(String::as_str))
            .unwrap_or_else(|_| project.tests.join(" "));
        let path = project.path.to_string_lossy();
        Some(
            self.test_command
                .replace("{name}", &project.name)
                .replace("{path}", &path)
                .replace("{tests}", &tests),
        )
    }
}

pub(crate) fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
