//! Configuration loader for ripple
//!
//! Builds the [`RuntimeConfig`] from, in decreasing precedence: explicit
//! command-line options, `RIPPLE_*` environment variables, the config file in
//! the repository root, and built-in defaults.

use crate::config::{resolve_against, Adapter, RuntimeConfig, RuntimeOptions};
use crate::file::ConfigFile;
use ripple_core::{
    Error, Result, RIPPLE_ADAPTER_VAR, RIPPLE_CACHE_URL_VAR, RIPPLE_NO_WRITE_VAR,
    RIPPLE_REGISTRY_VAR, RIPPLE_ROOT_VAR,
};
use std::path::PathBuf;

/// Configuration loader that handles all startup configuration
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: RuntimeOptions,
    /// Directory used when neither `--root` nor `RIPPLE_ROOT` is set
    directory: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback directory (defaults to the current directory)
    pub fn directory(mut self, dir: PathBuf) -> Self {
        self.directory = Some(dir);
        self
    }

    /// Set command-line overrides
    pub fn options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    /// Load the configuration
    pub fn load(self) -> Result<RuntimeConfig> {
        let root = self.resolve_root()?;
        let mut config = RuntimeConfig::new(&root);

        let config_file = match &self.options.config_path {
            Some(path) => {
                let path = resolve_against(&root, path);
                if !path.is_file() {
                    return Err(Error::configuration(format!(
                        "config file '{}' does not exist",
                        path.display()
                    )));
                }
                Some(path)
            }
            None => ConfigFile::discover(&root),
        };

        let file = match &config_file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                ConfigFile::load(path)?
            }
            None => ConfigFile::default(),
        };

        self.apply_file(&mut config, &file, config_file)?;
        self.apply_env(&mut config)?;
        self.apply_options(&mut config);

        if config.no_write {
            config.state_dir = None;
            config.cache_dir = None;
        }
        config.parallel = config.parallel.max(1);

        tracing::debug!(
            root = %config.root.display(),
            registry = %config.registry_path.display(),
            adapter = %config.adapter,
            no_write = config.no_write,
            "configuration loaded"
        );
        Ok(config)
    }

    fn resolve_root(&self) -> Result<PathBuf> {
        let root = match (&self.options.root, env_var(RIPPLE_ROOT_VAR)) {
            (Some(root), _) => root.clone(),
            (None, Some(root)) => PathBuf::from(root),
            (None, None) => self
                .directory
                .clone()
                .or_else(|| std::env::current_dir().ok())
                .ok_or_else(|| Error::configuration("Failed to determine working directory"))?,
        };
        root.canonicalize()
            .map_err(|e| Error::file_system(root, "resolve repository root", e))
    }

    fn apply_file(
        &self,
        config: &mut RuntimeConfig,
        file: &ConfigFile,
        config_file: Option<PathBuf>,
    ) -> Result<()> {
        if let Some(path) = &file.registry_path {
            config.registry_path = config.resolve(path);
        }
        config.tasks_path = match &file.tasks_file {
            Some(path) => Some(config.resolve(path)),
            None => config_file.clone(),
        };
        config.config_file = config_file;
        if let Some(dir) = &file.state_dir {
            config.state_dir = Some(config.resolve(dir));
        }
        if let Some(dir) = &file.cache_dir {
            config.cache_dir = Some(config.resolve(dir));
        }
        if file.cache_url.is_some() {
            config.cache_url = file.cache_url.clone();
        }
        if let Some(adapter) = &file.adapter {
            config.adapter = adapter.parse()?;
        }
        if let Some(command) = &file.test_command {
            config.test_command = command.clone();
        }
        if let Some(base) = &file.default_base {
            config.default_base = base.clone();
        }
        if let Some(parallel) = file.parallel {
            config.parallel = parallel;
        }
        if let Some(retries) = file.retries {
            config.retries = retries;
        }
        config.task_aliases = file.aliases.clone();
        Ok(())
    }

    fn apply_env(&self, config: &mut RuntimeConfig) -> Result<()> {
        if let Some(registry) = env_var(RIPPLE_REGISTRY_VAR) {
            config.registry_path = config.resolve(registry);
        }
        if let Some(adapter) = env_var(RIPPLE_ADAPTER_VAR) {
            config.adapter = adapter.parse()?;
        }
        if let Some(url) = env_var(RIPPLE_CACHE_URL_VAR) {
            config.cache_url = Some(url);
        }
        if env_var(RIPPLE_NO_WRITE_VAR).as_deref() == Some("1") {
            config.no_write = true;
        }
        Ok(())
    }

    fn apply_options(&self, config: &mut RuntimeConfig) {
        let options = &self.options;
        if let Some(registry) = &options.registry {
            config.registry_path = config.resolve(registry);
        }
        if let Some(url) = &options.cache_url {
            config.cache_url = Some(url.clone());
        }
        if let Some(adapter) = options.adapter {
            config.adapter = adapter;
        }
        if let Some(parallel) = options.parallel {
            config.parallel = parallel;
        }
        if let Some(retries) = options.retries {
            config.retries = retries;
        }
        if options.no_write {
            config.no_write = true;
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const VARS: &[&str] = &[
        RIPPLE_ROOT_VAR,
        RIPPLE_REGISTRY_VAR,
        RIPPLE_ADAPTER_VAR,
        RIPPLE_CACHE_URL_VAR,
        RIPPLE_NO_WRITE_VAR,
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    fn load_from(dir: &TempDir, options: RuntimeOptions) -> RuntimeConfig {
        ConfigLoader::new()
            .directory(dir.path().to_path_buf())
            .options(options)
            .load()
            .unwrap()
    }

    #[test]
    #[serial]
    fn test_defaults_without_config_file() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let config = load_from(&temp, RuntimeOptions::default());
        let root = temp.path().canonicalize().unwrap();

        assert_eq!(config.root, root);
        assert_eq!(config.registry_path, root.join("project_map.json"));
        assert!(config.config_file.is_none());
        assert!(config.tasks_path.is_none());
        assert_eq!(config.adapter, Adapter::Shell);
    }

    #[test]
    #[serial]
    fn test_config_file_values_resolve_against_root() {
        clear_env();
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("ripple.toml"),
            "registry_path = \"meta/map.json\"\ncache_dir = \"/tmp/ripple-cache\"\nparallel = 3\n",
        )
        .unwrap();
        let config = load_from(&temp, RuntimeOptions::default());
        let root = temp.path().canonicalize().unwrap();

        assert_eq!(config.registry_path, root.join("meta/map.json"));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/ripple-cache")));
        assert_eq!(config.parallel, 3);
        assert_eq!(config.tasks_path, Some(root.join("ripple.toml")));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_and_cli_overrides_env() {
        clear_env();
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("ripple.toml"),
            "adapter = \"shell\"\ncache_url = \"http://file\"\n",
        )
        .unwrap();

        std::env::set_var(RIPPLE_ADAPTER_VAR, "mock");
        std::env::set_var(RIPPLE_CACHE_URL_VAR, "http://env");
        let config = load_from(&temp, RuntimeOptions::default());
        assert_eq!(config.adapter, Adapter::Mock);
        assert_eq!(config.cache_url.as_deref(), Some("http://env"));

        let config = load_from(
            &temp,
            RuntimeOptions {
                cache_url: Some("s3://cli".to_string()),
                adapter: Some(Adapter::Shell),
                ..Default::default()
            },
        );
        assert_eq!(config.adapter, Adapter::Shell);
        assert_eq!(config.cache_url.as_deref(), Some("s3://cli"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_no_write_disables_state_and_cache() {
        clear_env();
        let temp = TempDir::new().unwrap();
        std::env::set_var(RIPPLE_NO_WRITE_VAR, "1");
        let config = load_from(&temp, RuntimeOptions::default());
        assert!(config.no_write);
        assert!(config.state_dir.is_none());
        assert!(config.cache_dir.is_none());
        assert!(config.last_results_path().is_none());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_root_from_env() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        std::env::set_var(RIPPLE_ROOT_VAR, other.path());
        let config = load_from(&temp, RuntimeOptions::default());
        assert_eq!(config.root, other.path().canonicalize().unwrap());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_explicit_config_is_an_error() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let err = ConfigLoader::new()
            .directory(temp.path().to_path_buf())
            .options(RuntimeOptions {
                config_path: Some(PathBuf::from("nope.toml")),
                ..Default::default()
            })
            .load()
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
