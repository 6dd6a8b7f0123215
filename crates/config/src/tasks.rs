//! Task specification loading from `[tasks.<name>]` tables

use indexmap::IndexMap;
use ripple_core::{Error, OutputSpec, Result, TaskSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::resolve_against;

#[derive(Debug, Default, Deserialize)]
struct TasksDocument {
    #[serde(default)]
    tasks: IndexMap<String, RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    command: Option<String>,
    #[serde(default)]
    deps: Vec<String>,
    #[serde(default)]
    inputs: Vec<PathBuf>,
    #[serde(default)]
    outputs: Vec<PathBuf>,
    cache_key: Option<String>,
}

/// Load task specs from a TOML file.
///
/// `None` means no task file is configured and yields an empty set.
pub fn load_task_specs(path: Option<&Path>, root: &Path) -> Result<IndexMap<String, TaskSpec>> {
    let Some(path) = path else {
        return Ok(IndexMap::new());
    };
    if !path.is_file() {
        return Err(Error::configuration(format!(
            "task config '{}' does not exist",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::file_system(path, "read task config", e))?;
    parse_task_specs(path, &content, root)
}

/// Parse task tables. Entries without a command are skipped; relative input
/// and output paths resolve against `root`.
pub fn parse_task_specs(
    path: &Path,
    content: &str,
    root: &Path,
) -> Result<IndexMap<String, TaskSpec>> {
    let document: TasksDocument =
        toml::from_str(content).map_err(|e| Error::toml(path, e.to_string()))?;

    let mut specs = IndexMap::new();
    for (name, raw) in document.tasks {
        let Some(command) = raw.command.filter(|c| !c.trim().is_empty()) else {
            tracing::debug!(task = %name, "ignoring task without a command");
            continue;
        };
        let outputs = raw
            .outputs
            .iter()
            .map(|p| OutputSpec {
                path: resolve_against(root, p),
                cache_key: raw.cache_key.clone(),
            })
            .collect();
        let spec = TaskSpec {
            name: name.clone(),
            command,
            inputs: raw.inputs.iter().map(|p| resolve_against(root, p)).collect(),
            outputs,
            deps: raw.deps,
        };
        specs.insert(name, spec);
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASKS: &str = r#"
[tasks.build]
command = "make build"
inputs = ["src/x.txt", "/etc/hosts"]
outputs = ["out/y.txt"]
cache_key = "v2"

[tasks.test]
command = "make test"
deps = ["build"]

[tasks.placeholder]
deps = ["build"]
"#;

    #[test]
    fn test_parse_tasks() {
        let specs = parse_task_specs(Path::new("ripple.toml"), TASKS, Path::new("/repo")).unwrap();

        assert_eq!(specs.keys().collect::<Vec<_>>(), vec!["build", "test"]);
        let build = &specs["build"];
        assert_eq!(build.command, "make build");
        assert_eq!(
            build.inputs,
            vec![PathBuf::from("/repo/src/x.txt"), PathBuf::from("/etc/hosts")]
        );
        assert_eq!(build.outputs[0].path, PathBuf::from("/repo/out/y.txt"));
        assert_eq!(build.outputs[0].cache_key.as_deref(), Some("v2"));
        assert_eq!(specs["test"].deps, vec!["build"]);
    }

    #[test]
    fn test_no_task_file_is_empty() {
        assert!(load_task_specs(None, Path::new("/repo")).unwrap().is_empty());
    }

    #[test]
    fn test_missing_task_file_is_an_error() {
        let err = load_task_specs(Some(Path::new("/definitely/not/here.toml")), Path::new("/"))
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
