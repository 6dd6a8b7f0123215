//! Project registry loading

use indexmap::IndexMap;
use ripple_core::{Error, Project, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    path: PathBuf,
    #[serde(default)]
    deps: Vec<String>,
    #[serde(default)]
    tests: Vec<String>,
    #[serde(default)]
    run: Option<Vec<String>>,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Load the project registry, preserving the file's declaration order.
///
/// A missing or malformed registry is a fatal configuration error.
pub fn load_registry(path: &Path) -> Result<Vec<Project>> {
    if !path.is_file() {
        return Err(Error::registry(path, "registry file not found"));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::registry(path, format!("cannot read registry: {e}")))?;
    parse_registry(path, &content)
}

pub(crate) fn parse_registry(path: &Path, content: &str) -> Result<Vec<Project>> {
    let entries: IndexMap<String, RegistryEntry> = serde_json::from_str(content)
        .map_err(|e| Error::registry(path, format!("invalid registry JSON: {e}")))?;

    let projects = entries
        .into_iter()
        .map(|(name, entry)| {
            let mut project = Project::new(name, entry.path)
                .with_deps(entry.deps)
                .with_tests(entry.tests);
            project.run = entry.run;
            project.description = entry.description;
            if let Some(kind) = entry.kind {
                project.kind = kind;
            }
            project
        })
        .collect::<Vec<_>>();

    tracing::debug!(path = %path.display(), projects = projects.len(), "registry loaded");
    Ok(projects)
}
