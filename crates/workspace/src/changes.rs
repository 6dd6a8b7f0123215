//! Change detection against version control
//!
//! Only two VCS capabilities are needed: changed paths between a reference
//! and `HEAD`, and changed paths since a point in time. Every failure
//! degrades to an empty change list flagged as `degraded`.

use ripple_core::{Error, Project, Result};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;

/// The version-control operations change detection relies on
pub trait VcsClient: Send + Sync {
    /// Paths changed in `<reference>...HEAD`
    fn diff_names(&self, reference: &str) -> Result<Vec<String>>;

    /// Common ancestor of `reference` and `HEAD`
    fn merge_base(&self, reference: &str) -> Result<String>;

    /// Paths touched by commits since `since` (a date or anything `git log
    /// --since` accepts), possibly with repeats
    fn changed_since(&self, since: &str) -> Result<Vec<String>>;
}

/// `git` command-line client rooted at the repository
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    program: String,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            program: "git".to_string(),
        }
    }

    /// Use a different git executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, operation: &str, args: &[&str]) -> Result<String> {
        tracing::debug!(args = ?args, "running git");
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::vcs(operation, format!("failed to spawn {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::vcs(operation, stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl VcsClient for GitCli {
    fn diff_names(&self, reference: &str) -> Result<Vec<String>> {
        let range = format!("{reference}...HEAD");
        self.run("diff", &["diff", "--name-only", &range])
            .map(|out| non_empty_lines(&out))
    }

    fn merge_base(&self, reference: &str) -> Result<String> {
        let out = self.run("merge-base", &["merge-base", reference, "HEAD"])?;
        let sha = out.trim();
        if sha.is_empty() {
            return Err(Error::vcs("merge-base", "empty merge-base output"));
        }
        Ok(sha.to_string())
    }

    fn changed_since(&self, since: &str) -> Result<Vec<String>> {
        let since_arg = format!("--since={since}");
        self.run(
            "log",
            &["log", &since_arg, "--name-only", "--pretty=format:"],
        )
        .map(|out| non_empty_lines(&out))
    }
}

/// What to diff against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    pub base: String,
    /// Diff from `merge-base(base, HEAD)` instead of `base`
    pub merge_base: bool,
    /// Time-window mode; overrides `base` when set
    pub since: Option<String>,
}

impl ChangeRequest {
    pub fn against(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            merge_base: false,
            since: None,
        }
    }

    #[must_use]
    pub fn with_merge_base(mut self, merge_base: bool) -> Self {
        self.merge_base = merge_base;
        self
    }

    #[must_use]
    pub fn with_since(mut self, since: Option<String>) -> Self {
        self.since = since;
        self
    }
}

/// Changed paths plus whether the list is a degraded fallback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFiles {
    pub files: Vec<String>,
    /// True when version control failed and `files` is empty as a result
    pub degraded: bool,
}

/// Collect changed paths. Never fails: VCS errors are logged and produce an
/// empty, degraded list so callers fall back to "everything is affected".
pub fn collect_changes(vcs: &dyn VcsClient, request: &ChangeRequest) -> ChangedFiles {
    if let Some(since) = &request.since {
        return match vcs.changed_since(since) {
            Ok(files) => ChangedFiles {
                files: dedupe_preserving_order(files),
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, since = %since, "git log failed; treating all projects as affected");
                ChangedFiles {
                    files: Vec::new(),
                    degraded: true,
                }
            }
        };
    }

    let mut reference = request.base.clone();
    if request.merge_base {
        match vcs.merge_base(&request.base) {
            Ok(sha) => {
                tracing::info!(base = %request.base, merge_base = %sha, "using merge-base");
                reference = sha;
            }
            Err(e) => {
                tracing::warn!(error = %e, base = %request.base, "merge-base failed; diffing against base ref");
            }
        }
    }

    match vcs.diff_names(&reference) {
        Ok(files) => ChangedFiles {
            files,
            degraded: false,
        },
        Err(e) => {
            tracing::warn!(error = %e, reference = %reference, "git diff failed; treating all projects as affected");
            ChangedFiles {
                files: Vec::new(),
                degraded: true,
            }
        }
    }
}

fn dedupe_preserving_order(files: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.clone()))
        .collect()
}

/// Map changed paths onto the projects that own them.
///
/// A path belongs to a project when it equals the project root or lies
/// beneath it; with nested roots the longest matching root wins.
pub fn match_projects_for_paths<'a, I>(projects: I, paths: &[String]) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Project>,
{
    let roots: Vec<(String, &str)> = projects
        .into_iter()
        .map(|p| (p.root_prefix(), p.name.as_str()))
        .collect();

    let mut touched = BTreeSet::new();
    for path in paths {
        let path = path.trim_start_matches("./");
        let owner = roots
            .iter()
            .filter(|(root, _)| owns(root, path))
            .max_by_key(|(root, _)| root.len());
        if let Some((_, name)) = owner {
            touched.insert((*name).to_string());
        }
    }
    touched
}

fn owns(root: &str, path: &str) -> bool {
    if root.is_empty() || root == "." {
        return true;
    }
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}
