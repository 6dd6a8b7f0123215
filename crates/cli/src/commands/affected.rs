//! Change detection and affected test runs

use crate::commands::{ChangeArgs, ExecArgs};
use crate::output;
use crate::pipeline;
use ripple_config::{RuntimeConfig, StateStore};
use ripple_core::Project;
use ripple_task::project_test_items;
use ripple_workspace::{compute_affected, AffectedSet, ChangeRequest, GitCli, ProjectGraph};

/// Pick the base reference: `--base`, then `--base-from last`, then the
/// configured default. The choice is remembered for the next `--base-from last`.
fn resolve_base(config: &RuntimeConfig, change: &ChangeArgs) -> String {
    let state = StateStore::new(config.state_file_path());
    let base = match (&change.base, change.base_from.as_deref()) {
        (Some(base), _) => base.clone(),
        (None, Some("last")) => state.load().last_base.unwrap_or_else(|| {
            tracing::warn!(default = %config.default_base, "no recorded base, using the default");
            config.default_base.clone()
        }),
        _ => config.default_base.clone(),
    };

    if let Err(e) = state.update(|s| s.last_base = Some(base.clone())) {
        tracing::warn!(error = %e, "failed to record base reference");
    }
    base
}

fn affected_set(config: &RuntimeConfig, graph: &ProjectGraph, change: &ChangeArgs) -> AffectedSet {
    let request = if change.no_diff {
        ChangeRequest::against(config.default_base.clone())
    } else {
        ChangeRequest::against(resolve_base(config, change))
            .with_merge_base(change.merge_base)
            .with_since(change.since.clone())
    };
    let vcs = GitCli::new(&config.root);
    let set = compute_affected(graph, &vcs, &request, change.no_diff);
    tracing::info!(
        mode = %set.mode,
        changed = set.changed_files.len(),
        projects = set.projects.len(),
        degraded = set.degraded,
        "affected projects computed"
    );
    set
}

pub fn affected(
    config: &RuntimeConfig,
    graph: &ProjectGraph,
    change: &ChangeArgs,
    json: bool,
) -> eyre::Result<i32> {
    let set = affected_set(config, graph, change);
    if json {
        output::print_json(&set)?;
        return Ok(0);
    }
    for name in &set.projects {
        println!("{name}");
    }
    Ok(0)
}

/// Test every affected project, dependencies first
pub async fn test(
    config: &RuntimeConfig,
    graph: &ProjectGraph,
    change: &ChangeArgs,
    exec: &ExecArgs,
) -> eyre::Result<i32> {
    let set = affected_set(config, graph, change);
    if !exec.json {
        println!("{} mode: {} project(s) to test", set.mode, set.projects.len());
    }
    let projects: Vec<&Project> = set.projects.iter().filter_map(|n| graph.get(n)).collect();
    let items = project_test_items(projects, config);
    pipeline::run_items(config, "tests", items, exec).await
}
