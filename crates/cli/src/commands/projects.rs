//! Registry inspection and project run targets

use crate::commands::ExecArgs;
use crate::output;
use crate::pipeline;
use eyre::eyre;
use ripple_config::RuntimeConfig;
use ripple_core::Project;
use ripple_task::project_run_item;
use ripple_workspace::{render_graph, GraphFormat, ProjectGraph};

fn project<'a>(graph: &'a ProjectGraph, name: &str) -> eyre::Result<&'a Project> {
    graph
        .get(name)
        .ok_or_else(|| eyre!("unknown project '{name}'"))
}

pub fn list(graph: &ProjectGraph, json: bool) -> eyre::Result<i32> {
    if json {
        let projects: Vec<&Project> = graph.projects().collect();
        output::print_json(&projects)?;
        return Ok(0);
    }

    for project in graph.projects() {
        println!("{} [{}] {}", project.name, project.kind, project.path.display());
        if !project.description.is_empty() {
            println!("  {}", project.description);
        }
        if !project.deps.is_empty() {
            println!("  deps:  {}", project.deps.join(", "));
        }
        if !project.tests.is_empty() {
            println!("  tests: {}", project.tests.join(" "));
        }
        if let Some(run) = project.run.as_ref().filter(|r| !r.is_empty()) {
            println!("  run:   {}", run.join(" "));
        }
    }
    Ok(0)
}

pub fn deps(graph: &ProjectGraph, name: &str, reverse: bool) -> eyre::Result<i32> {
    project(graph, name)?;
    let names = if reverse {
        graph.dependents(name)
    } else {
        graph.dependencies(name)
    };
    for dep in names {
        println!("{dep}");
    }
    Ok(0)
}

pub fn graph(graph: &ProjectGraph, format: GraphFormat) -> eyre::Result<i32> {
    print!("{}", render_graph(graph, format));
    Ok(0)
}

/// Report registry problems; any warning makes the exit code 1
pub fn validate(graph: &ProjectGraph, config: &RuntimeConfig) -> eyre::Result<i32> {
    let warnings = graph.validate(&config.root);
    if warnings.is_empty() {
        println!("registry ok: {} projects", graph.len());
        return Ok(0);
    }
    for warning in &warnings {
        println!("warning: {warning}");
    }
    Ok(1)
}

/// Run a project's `run` command list through the configured adapter
pub async fn run(config: &RuntimeConfig, graph: &ProjectGraph, name: &str) -> eyre::Result<i32> {
    let project = project(graph, name)?;
    let item = project_run_item(project)
        .ok_or_else(|| eyre!("project '{name}' has no run target"))?;
    let label = item.name.clone();
    pipeline::run_items(config, &label, vec![item], &ExecArgs::default()).await
}
