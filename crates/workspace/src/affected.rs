//! Affected-project computation

use crate::changes::{collect_changes, match_projects_for_paths, ChangeRequest, VcsClient};
use crate::graph::ProjectGraph;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// How the affected set was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AffectedMode {
    /// Diffing was skipped on request; every project with tests
    NoDiff,
    /// The ref diff was empty (or failed); every project with tests
    All,
    /// The time window had no changes (or failed); every project with tests
    SinceEmpty,
    /// Projects touched by the ref diff plus their dependents
    Affected,
    /// Projects touched in the time window plus their dependents
    Since,
}

impl fmt::Display for AffectedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AffectedMode::NoDiff => "no-diff",
            AffectedMode::All => "all",
            AffectedMode::SinceEmpty => "since-empty",
            AffectedMode::Affected => "affected",
            AffectedMode::Since => "since",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedSet {
    pub mode: AffectedMode,
    pub changed_files: Vec<String>,
    /// Projects whose files changed directly
    pub direct: BTreeSet<String>,
    /// Projects to test, dependencies first
    pub projects: Vec<String>,
    /// Version control failed and the result is a fallback
    pub degraded: bool,
}

/// Work out which projects with tests need to run, in dependency order
pub fn compute_affected(
    graph: &ProjectGraph,
    vcs: &dyn VcsClient,
    request: &ChangeRequest,
    no_diff: bool,
) -> AffectedSet {
    let with_tests = |names: &mut dyn Iterator<Item = String>| -> Vec<String> {
        let filtered: Vec<String> = names
            .filter(|n| graph.get(n).is_some_and(|p| p.has_tests()))
            .collect();
        graph.topo_order(&filtered)
    };

    if no_diff {
        return AffectedSet {
            mode: AffectedMode::NoDiff,
            changed_files: Vec::new(),
            direct: BTreeSet::new(),
            projects: with_tests(&mut graph.names().into_iter()),
            degraded: false,
        };
    }

    let changes = collect_changes(vcs, request);
    if changes.files.is_empty() {
        let mode = if request.since.is_some() {
            AffectedMode::SinceEmpty
        } else {
            AffectedMode::All
        };
        tracing::info!(mode = %mode, "no changes detected; selecting every project with tests");
        return AffectedSet {
            mode,
            changed_files: Vec::new(),
            direct: BTreeSet::new(),
            projects: with_tests(&mut graph.names().into_iter()),
            degraded: changes.degraded,
        };
    }

    let direct = match_projects_for_paths(graph.projects(), &changes.files);
    let expanded = graph.expand_with_dependents(&direct);
    // Registry order first so the topological tie-break input is stable
    let mut candidates = graph.names().into_iter().filter(|n| expanded.contains(n));
    let projects = with_tests(&mut candidates);

    tracing::info!(
        changed = changes.files.len(),
        direct = direct.len(),
        affected = projects.len(),
        "computed affected projects"
    );

    AffectedSet {
        mode: if request.since.is_some() {
            AffectedMode::Since
        } else {
            AffectedMode::Affected
        },
        changed_files: changes.files,
        direct,
        projects,
        degraded: false,
    }
}
