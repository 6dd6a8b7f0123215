//! The scheduler: tiered execution with cache short-circuiting
//!
//! Work items are peeled into tiers of mutually independent items. A tier is
//! only submitted once every item of the previous tier reached a terminal
//! state, so no item ever starts before its dependencies finished. Within a
//! tier, serial mode runs items one by one in order while parallel mode runs
//! them on a semaphore-bounded pool.
//!
//! Per item the flow is: fingerprint, same-machine freshness check, cache
//! restore, then execution with retries, then store on success. Cache
//! problems are logged and treated as misses; they never fail the run.

use crate::cancel::Cancellation;
use crate::plan::WorkPlan;
use crate::runner::{CommandOutcome, CommandRunner};
use ripple_cache::{hash_inputs, outputs_fresh, ArtifactCache, RestoreOutcome};
use ripple_core::{
    overall_exit_code, CacheMode, ExecutionMode, ExecutionResult, ItemStatus, RunSummary,
    WorkItem,
};
use ripple_utils::tracing::{cache_event, item_span, pipeline_span, tier_span};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Called once per item when it reaches a terminal state
pub type ProgressFn = Arc<dyn Fn(&ExecutionResult) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub execution: ExecutionMode,
    pub cache_mode: CacheMode,
    /// Extra attempts after a non-zero exit
    pub retries: u32,
    /// Keep running independent items after a failure
    pub keep_going: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            execution: ExecutionMode::Serial,
            cache_mode: CacheMode::Off,
            retries: 0,
            keep_going: false,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub exit_code: i32,
    /// One result per item that reached a terminal state, in completion order
    pub results: Vec<ExecutionResult>,
    /// The run stopped early; items after the stop have no result
    pub aborted: bool,
}

impl RunReport {
    pub fn result(&self, name: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn into_summary(self, label: impl Into<String>) -> RunSummary {
        RunSummary::new(label, self.exit_code, self.aborted, self.results)
    }
}

/// State shared with every in-flight item
struct ItemContext {
    runner: Arc<dyn CommandRunner>,
    cache: Option<ArtifactCache>,
    options: SchedulerOptions,
    cancel: Cancellation,
    abort: AtomicBool,
}

impl ItemContext {
    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.abort.load(Ordering::SeqCst)
    }

    /// Stop submitting work after `result` unless running in keep-going mode
    fn note(&self, result: &ExecutionResult) {
        let fatal = matches!(result.status, ItemStatus::Failed | ItemStatus::Cancelled);
        if fatal && !self.options.keep_going && !self.abort.swap(true, Ordering::SeqCst) {
            tracing::error!(item = %result.name, "aborting run after failure");
        }
    }
}

pub struct Scheduler {
    runner: Arc<dyn CommandRunner>,
    cache: Option<ArtifactCache>,
    options: SchedulerOptions,
    cancel: Cancellation,
    progress: Option<ProgressFn>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn CommandRunner>, options: SchedulerOptions) -> Self {
        Self {
            runner,
            cache: None,
            options,
            cancel: Cancellation::new(),
            progress: None,
        }
    }

    /// Backend consulted when the cache mode is not `off`
    pub fn with_cache(mut self, cache: ArtifactCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ExecutionResult) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// Run `items` in dependency order. Never fails: every problem ends up
    /// in an item's result.
    pub async fn run(&self, items: Vec<WorkItem>) -> RunReport {
        let span = pipeline_span("run", items.len());
        self.run_plan(WorkPlan::new(items)).instrument(span).await
    }

    async fn run_plan(&self, plan: WorkPlan) -> RunReport {
        let ctx = Arc::new(ItemContext {
            runner: Arc::clone(&self.runner),
            cache: self.cache.clone(),
            options: self.options,
            cancel: self.cancel.clone(),
            abort: AtomicBool::new(false),
        });
        tracing::info!(
            items = plan.len(),
            mode = ?self.options.execution,
            cache = %self.options.cache_mode,
            retries = self.options.retries,
            keep_going = self.options.keep_going,
            "starting run"
        );

        let mut statuses: HashMap<String, ItemStatus> = HashMap::with_capacity(plan.len());
        let mut results = Vec::with_capacity(plan.len());
        let mut aborted = false;

        for (index, tier) in plan.tiers().into_iter().enumerate() {
            if ctx.should_stop() {
                aborted = true;
                break;
            }

            let mut runnable = Vec::with_capacity(tier.len());
            for item in tier {
                let failed_dep = plan
                    .dependencies(&item.name)
                    .into_iter()
                    .find(|dep| statuses.get(*dep).is_some_and(|s| !s.is_success()));
                match failed_dep {
                    Some(dep) => {
                        let result = ExecutionResult::skipped(
                            &item.name,
                            format!("dependency '{dep}' did not succeed"),
                        );
                        tracing::warn!(item = %item.name, dependency = %dep, "skipped");
                        self.report(&result);
                        statuses.insert(result.name.clone(), result.status);
                        results.push(result);
                    }
                    None => runnable.push(item.clone()),
                }
            }

            let span = tier_span(index, runnable.len());
            let finished = self.run_tier(&ctx, runnable).instrument(span).await;
            for result in finished {
                statuses.insert(result.name.clone(), result.status);
                results.push(result);
            }
        }

        if ctx.should_stop() {
            aborted = true;
        }
        let mut exit_code = overall_exit_code(&results);
        if aborted {
            exit_code = exit_code.max(1);
        }
        tracing::info!(
            exit_code,
            succeeded = count(&results, ItemStatus::Succeeded),
            cached = count(&results, ItemStatus::Cached),
            failed = count(&results, ItemStatus::Failed),
            skipped = count(&results, ItemStatus::Skipped),
            aborted,
            "run finished"
        );

        RunReport {
            exit_code,
            results,
            aborted,
        }
    }

    async fn run_tier(&self, ctx: &Arc<ItemContext>, items: Vec<WorkItem>) -> Vec<ExecutionResult> {
        let mut finished = Vec::with_capacity(items.len());

        match self.options.execution {
            ExecutionMode::Serial => {
                for item in items {
                    if ctx.should_stop() {
                        break;
                    }
                    let span = item_span(&item.name);
                    let result = process_item(ctx, item).instrument(span).await;
                    ctx.note(&result);
                    self.report(&result);
                    finished.push(result);
                }
            }
            ExecutionMode::Parallel(_) => {
                let permits = Arc::new(Semaphore::new(self.options.execution.workers()));
                let mut set = JoinSet::new();
                for item in items {
                    let ctx = Arc::clone(ctx);
                    let permits = Arc::clone(&permits);
                    let span = item_span(&item.name);
                    set.spawn(
                        async move {
                            let _permit = permits.acquire_owned().await.ok()?;
                            if ctx.should_stop() {
                                return None;
                            }
                            let result = process_item(&ctx, item).await;
                            ctx.note(&result);
                            Some(result)
                        }
                        .instrument(span),
                    );
                }

                while let Some(joined) = set.join_next().await {
                    match joined {
                        Ok(Some(result)) => {
                            self.report(&result);
                            finished.push(result);
                        }
                        Ok(None) => {}
                        Err(e) => tracing::error!(error = %e, "work item task failed to complete"),
                    }
                }
            }
        }

        finished
    }

    fn report(&self, result: &ExecutionResult) {
        if let Some(progress) = &self.progress {
            progress(result);
        }
    }
}

fn count(results: &[ExecutionResult], status: ItemStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

async fn process_item(ctx: &ItemContext, item: WorkItem) -> ExecutionResult {
    let cache_mode = ctx.options.cache_mode;
    let mut key = None;

    if cache_mode.is_enabled() {
        let (fingerprint, fresh) = fingerprint_item(ctx, &item).await;
        if lookup(ctx, &item, &fingerprint, fresh).await {
            return ExecutionResult::cache_hit(&item.name, fingerprint);
        }
        if !cache_mode.can_execute() {
            tracing::warn!(item = %item.name, cache_key = %fingerprint, "not in cache; restore-only mode does not execute");
            return ExecutionResult::skipped(&item.name, "not in cache (restore-only)")
                .with_cache_key(Some(fingerprint));
        }
        key = Some(fingerprint);
    }

    let started = Instant::now();
    let max_attempts = ctx.options.retries.saturating_add(1);
    let mut attempts = 0u32;
    let outcome = loop {
        if ctx.cancel.is_cancelled() {
            return ExecutionResult::cancelled(&item.name, started.elapsed(), attempts);
        }
        attempts += 1;
        let outcome = match ctx.runner.run(&item, &ctx.cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(item = %item.name, attempt = attempts, error = %e, "command could not be started");
                CommandOutcome::finished(127, e.to_string())
            }
        };
        if outcome.cancelled {
            return ExecutionResult::cancelled(&item.name, started.elapsed(), attempts);
        }
        if outcome.success() || attempts >= max_attempts {
            break outcome;
        }
        tracing::warn!(
            item = %item.name,
            attempt = attempts,
            exit_code = outcome.exit_code,
            "command failed; retrying"
        );
    };

    let duration = started.elapsed();
    let result = ExecutionResult::executed(
        &item.name,
        outcome.exit_code,
        duration,
        attempts,
        &outcome.last_line,
    )
    .with_cache_key(key.clone());

    if result.status.is_success() {
        tracing::info!(item = %item.name, duration_ms = duration.as_millis() as u64, attempt = attempts, "succeeded");
        if let (true, Some(cache), Some(key)) = (cache_mode.can_store(), &ctx.cache, &key) {
            match cache.save(&item, key).await {
                Ok(_) => tracing::debug!(item = %item.name, cache_key = %key, "stored in cache"),
                Err(e) => tracing::warn!(item = %item.name, cache_key = %key, error = %e, "cache store failed"),
            }
        }
    } else {
        tracing::error!(
            item = %item.name,
            exit_code = outcome.exit_code,
            duration_ms = duration.as_millis() as u64,
            attempt = attempts,
            last_line = %outcome.last_line,
            "failed"
        );
    }
    result
}

/// Fingerprint and freshness, computed off the async workers
async fn fingerprint_item(ctx: &ItemContext, item: &WorkItem) -> (String, bool) {
    let filter = ctx
        .cache
        .as_ref()
        .map(|cache| cache.input_filter().clone())
        .unwrap_or_default();
    let owned = item.clone();
    let blocking_filter = filter.clone();
    match tokio::task::spawn_blocking(move || {
        (
            hash_inputs(&owned, &blocking_filter),
            outputs_fresh(&owned, &blocking_filter),
        )
    })
    .await
    {
        Ok(computed) => computed,
        Err(e) => {
            tracing::debug!(item = %item.name, error = %e, "fingerprint task failed; hashing inline");
            (hash_inputs(item, &filter), outputs_fresh(item, &filter))
        }
    }
}

async fn lookup(ctx: &ItemContext, item: &WorkItem, key: &str, fresh: bool) -> bool {
    if fresh {
        cache_event(&item.name, key, true, "fresh");
        return true;
    }
    let Some(cache) = &ctx.cache else {
        cache_event(&item.name, key, false, "none");
        return false;
    };
    match cache.restore(item, key).await {
        Ok(RestoreOutcome::Hit) => {
            cache_event(&item.name, key, true, cache.store_name());
            true
        }
        Ok(RestoreOutcome::Stale) => {
            tracing::warn!(item = %item.name, cache_key = %key, "restored outputs are older than inputs; executing");
            false
        }
        Ok(RestoreOutcome::Miss) => {
            cache_event(&item.name, key, false, cache.store_name());
            false
        }
        Err(e) => {
            tracing::warn!(item = %item.name, cache_key = %key, error = %e, "cache fetch failed; treating as miss");
            false
        }
    }
}
