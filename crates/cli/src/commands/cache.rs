//! Cache maintenance

use crate::commands::tasks::load_specs;
use crate::pipeline::input_filter;
use eyre::eyre;
use ripple_cache::fingerprinter_for;
use ripple_config::RuntimeConfig;

/// Remove the local cache directory
pub fn clean(config: &RuntimeConfig) -> eyre::Result<i32> {
    let Some(dir) = &config.cache_dir else {
        println!("writes are disabled; nothing to clean");
        return Ok(0);
    };
    if !dir.exists() {
        println!("cache is already empty");
        return Ok(0);
    }
    std::fs::remove_dir_all(dir)?;
    tracing::info!(path = %dir.display(), "cache removed");
    println!("removed {}", dir.display());
    Ok(0)
}

/// Print the cache key a task would use right now
pub fn key(config: &RuntimeConfig, name: &str, explain: bool) -> eyre::Result<i32> {
    let specs = load_specs(config)?;
    let name = config.resolve_task_alias(name);
    let spec = specs
        .get(name)
        .ok_or_else(|| eyre!("unknown task '{name}'"))?;

    let fingerprinter = fingerprinter_for(spec, &input_filter(config));
    if explain {
        for entry in &fingerprinter.manifest.entries {
            println!("  {entry}");
        }
    }
    println!("{}", fingerprinter.finish());
    Ok(0)
}
