//! Turning projects into schedulable work items

use ripple_config::RuntimeConfig;
use ripple_core::{Project, WorkItem};
use std::collections::HashSet;

/// Test work items for `projects`, in the given order.
///
/// Each item runs the configured test command. Its inputs are the project
/// root and its test paths; it declares no outputs, so the cache can only
/// remember that it passed. Dependencies are limited to projects in the
/// same batch. Projects without tests are left out.
pub fn project_test_items<'a, I>(projects: I, config: &RuntimeConfig) -> Vec<WorkItem>
where
    I: IntoIterator<Item = &'a Project>,
{
    let projects: Vec<&Project> = projects.into_iter().collect();
    let in_batch: HashSet<&str> = projects
        .iter()
        .filter(|p| p.has_tests())
        .map(|p| p.name.as_str())
        .collect();

    projects
        .into_iter()
        .filter_map(|project| {
            let command = config.test_command_for(project)?;
            let mut inputs = vec![config.resolve(&project.path)];
            inputs.extend(project.tests.iter().map(|t| config.resolve(t)));
            let deps: Vec<&str> = project
                .deps
                .iter()
                .map(String::as_str)
                .filter(|d| in_batch.contains(d))
                .collect();
            Some(
                WorkItem::new(project.name.clone(), command)
                    .with_inputs(inputs)
                    .with_deps(deps),
            )
        })
        .collect()
}

/// The run target of a project as a work item, `None` when it has none
pub fn project_run_item(project: &Project) -> Option<WorkItem> {
    let run = project.run.as_ref().filter(|r| !r.is_empty())?;
    let command = shlex::try_join(run.iter().map(String::as_str)).ok()?;
    Some(WorkItem::new(format!("{}:run", project.name), command))
}
