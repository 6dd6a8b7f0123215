//! Configured tasks

use crate::commands::ExecArgs;
use crate::pipeline;
use indexmap::IndexMap;
use ripple_config::{load_task_specs, RuntimeConfig};
use ripple_core::TaskSpec;
use ripple_task::resolve_tasks;

pub(crate) fn load_specs(config: &RuntimeConfig) -> eyre::Result<IndexMap<String, TaskSpec>> {
    Ok(load_task_specs(config.tasks_path.as_deref(), &config.root)?)
}

pub fn list(config: &RuntimeConfig) -> eyre::Result<i32> {
    let specs = load_specs(config)?;
    if specs.is_empty() {
        println!("no tasks configured");
        return Ok(0);
    }

    let all: Vec<String> = specs.keys().cloned().collect();
    for spec in resolve_tasks(&specs, &all)? {
        if spec.deps.is_empty() {
            println!("{}: {}", spec.name, spec.command);
        } else {
            println!("{} (after {}): {}", spec.name, spec.deps.join(", "), spec.command);
        }
    }
    for (alias, target) in &config.task_aliases {
        println!("{alias} -> {target}");
    }
    Ok(0)
}

/// Run the named tasks plus their dependency closure
pub async fn run(config: &RuntimeConfig, names: &[String], exec: &ExecArgs) -> eyre::Result<i32> {
    let specs = load_specs(config)?;
    let requested: Vec<String> = names
        .iter()
        .map(|n| config.resolve_task_alias(n).to_string())
        .collect();
    let items = resolve_tasks(&specs, &requested)?;
    pipeline::run_items(config, "tasks", items, exec).await
}
