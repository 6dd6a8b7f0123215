//! Shared execution path for `test`, `run` and `tasks run`

use crate::commands::{CacheArg, ExecArgs};
use crate::output;
use eyre::eyre;
use ripple_cache::{open_store, ArtifactCache, InputFilter};
use ripple_config::{RuntimeConfig, StateStore};
use ripple_core::{CacheMode, ExecutionMode, WorkItem, DEFAULT_CACHE_DIR};
use ripple_task::{
    runner_for, Cancellation, JsonResultRecorder, NullRecorder, ResultSink, Scheduler,
    SchedulerOptions,
};
use tempfile::TempDir;

/// Cache wiring for one run. A throwaway staging directory lives as long as
/// the run when there is no cache directory to stage in.
struct CacheSetup {
    cache: ArtifactCache,
    _staging: Option<TempDir>,
}

/// Fingerprints skip the configured state and cache directories
pub fn input_filter(config: &RuntimeConfig) -> InputFilter {
    config
        .state_dir
        .iter()
        .chain(config.cache_dir.iter())
        .fold(InputFilter::default(), |filter, dir| filter.exclude(dir))
}

/// Map `--cache` onto a mode and a backend
fn open_cache(config: &RuntimeConfig, arg: CacheArg) -> eyre::Result<(CacheMode, Option<CacheSetup>)> {
    let default_local = config
        .cache_dir
        .clone()
        .unwrap_or_else(|| config.root.join(DEFAULT_CACHE_DIR));

    let (mode, location) = match arg {
        CacheArg::Off => return Ok((CacheMode::Off, None)),
        CacheArg::Local => {
            if config.cache_dir.is_none() {
                return Err(eyre!("the local cache is unavailable when writes are disabled"));
            }
            (CacheMode::ReadWrite, "local".to_string())
        }
        CacheArg::Remote => {
            let url = config
                .cache_url
                .clone()
                .ok_or_else(|| eyre!("--cache remote needs a cache URL (--cache-url or RIPPLE_CACHE_URL)"))?;
            (CacheMode::ReadWrite, url)
        }
        CacheArg::RestoreOnly => match (&config.cache_url, &config.cache_dir) {
            (Some(url), _) => (CacheMode::RestoreOnly, url.clone()),
            (None, Some(_)) => (CacheMode::RestoreOnly, "local".to_string()),
            (None, None) => {
                return Err(eyre!(
                    "--cache restore-only needs a cache URL when writes are disabled"
                ))
            }
        },
    };

    let store = open_store(&location, &default_local)?;
    let (staging, guard) = match &config.cache_dir {
        Some(dir) => (dir.join("staging"), None),
        None => {
            let temp = TempDir::new()?;
            (temp.path().to_path_buf(), Some(temp))
        }
    };
    tracing::info!(store = store.name(), mode = %mode, "cache enabled");
    let cache =
        ArtifactCache::new(store, &config.root, staging).with_input_filter(input_filter(config));
    Ok((
        mode,
        Some(CacheSetup {
            cache,
            _staging: guard,
        }),
    ))
}

fn result_sink(config: &RuntimeConfig) -> Box<dyn ResultSink> {
    match config.last_results_path() {
        Some(path) => Box::new(JsonResultRecorder::new(path)),
        None => Box::new(NullRecorder),
    }
}

/// Execute `items`, print progress and the summary, record the run and
/// return the exit code
pub async fn run_items(
    config: &RuntimeConfig,
    label: &str,
    items: Vec<WorkItem>,
    exec: &ExecArgs,
) -> eyre::Result<i32> {
    if items.is_empty() {
        if exec.json {
            output::print_json(&ripple_core::RunSummary::new(label, 0, false, Vec::new()))?;
        } else {
            println!("{label}: nothing to run");
        }
        return Ok(0);
    }

    let (cache_mode, cache) = open_cache(config, exec.cache)?;
    let options = SchedulerOptions {
        execution: ExecutionMode::from_workers(exec.parallel.unwrap_or(config.parallel)),
        cache_mode,
        retries: exec.retries.unwrap_or(config.retries),
        keep_going: exec.keep_going,
    };

    let cancel = Cancellation::new();
    let mut scheduler = Scheduler::new(runner_for(config.adapter, &config.root), options)
        .with_cancellation(cancel.clone());
    if let Some(setup) = &cache {
        scheduler = scheduler.with_cache(setup.cache.clone());
    }
    if !exec.json {
        scheduler = scheduler.on_progress(|result| println!("{}", output::progress_line(result)));
    }

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling run");
            cancel.cancel();
        }
    });
    let report = scheduler.run(items).await;
    interrupt.abort();

    let summary = report.into_summary(label);
    if let Err(e) = result_sink(config).record(&summary) {
        tracing::warn!(error = %e, "failed to record run results");
    }
    let failed = summary.exit_code != 0;
    if let Err(e) = StateStore::new(config.state_file_path())
        .update(|state| state.last_failed = failed.then(|| label.to_string()))
    {
        tracing::warn!(error = %e, "failed to update state");
    }

    if exec.json {
        output::print_json(&summary)?;
    } else {
        println!("{}", output::summary_text(&summary));
    }
    Ok(summary.exit_code)
}
