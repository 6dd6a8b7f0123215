//! On-disk `ripple.toml` format

use ripple_core::{Error, Result, CONFIG_FILENAMES};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings read from `ripple.toml` / `.ripple.toml`.
///
/// Every field is optional; unset fields fall through to defaults. Task
/// tables (`[tasks.<name>]`) live in the same file but are read separately by
/// [`crate::load_task_specs`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub registry_path: Option<PathBuf>,
    /// Separate file for task tables; defaults to this config file
    pub tasks_file: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub cache_url: Option<String>,
    pub adapter: Option<String>,
    pub test_command: Option<String>,
    pub default_base: Option<String>,
    pub parallel: Option<usize>,
    pub retries: Option<u32>,
    pub aliases: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Parse a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read config file", e))?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::toml(path, e.to_string()))
    }

    /// First existing config file inside `root`
    pub fn discover(root: &Path) -> Option<PathBuf> {
        CONFIG_FILENAMES
            .iter()
            .map(|name| root.join(name))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_file() {
        let content = r#"
registry_path = "meta/projects.json"
cache_url = "s3://bucket/ci"
adapter = "mock"
test_command = "cargo test -p {name}"
parallel = 4
retries = 2

[aliases]
ci = "verify"

[tasks.build]
command = "make"
"#;
        let file = ConfigFile::parse(Path::new("ripple.toml"), content).unwrap();
        assert_eq!(file.registry_path, Some(PathBuf::from("meta/projects.json")));
        assert_eq!(file.cache_url.as_deref(), Some("s3://bucket/ci"));
        assert_eq!(file.adapter.as_deref(), Some("mock"));
        assert_eq!(file.parallel, Some(4));
        assert_eq!(file.retries, Some(2));
        assert_eq!(file.aliases.get("ci").map(String::as_str), Some("verify"));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = ConfigFile::parse(Path::new("ripple.toml"), "parallel = [").unwrap_err();
        assert!(matches!(err, Error::Toml { .. }));
    }

    #[test]
    fn test_discover_prefers_visible_file() {
        let temp = TempDir::new().unwrap();
        assert!(ConfigFile::discover(temp.path()).is_none());

        std::fs::write(temp.path().join(".ripple.toml"), "").unwrap();
        assert_eq!(
            ConfigFile::discover(temp.path()),
            Some(temp.path().join(".ripple.toml"))
        );

        std::fs::write(temp.path().join("ripple.toml"), "").unwrap();
        assert_eq!(
            ConfigFile::discover(temp.path()),
            Some(temp.path().join("ripple.toml"))
        );
    }
}
