//! C11 — coordinator façade.
//!
//! Owns every other component and exposes the public operations that
//! `lib.rs` re-exports. A scoped resource: `cleanup()` releases the
//! cache, queue, and circuit registry, and is safe to call more than
//! once (see DESIGN.md — the source's `__del__`-based cleanup was judged
//! unreliable, so this is an explicit acquire/release pattern instead).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::cache::ResultCache;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::executor::{self, ExecutorContext};
use crate::extractor::ExtractorRegistry;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::pool::{self, ProgressObserver};
use crate::queue::PriorityQueue;
use crate::result::{ExportFormat, ResultStore, TaskResult};
use crate::robots::RobotsFetcher;
use crate::task::Task;

/// Returned by `run()` and `retry_failed()`.
#[derive(Debug, Clone)]
pub struct RunEnvelope {
    pub results: Vec<TaskResult>,
    pub metrics: MetricsSnapshot,
    pub cache_hit_rate: f64,
    pub duration_secs: f64,
}

pub struct Coordinator<F> {
    queue: PriorityQueue,
    cache: ResultCache,
    circuit: CircuitBreaker,
    robots: crate::robots::RobotsPolicy<F>,
    extractors: ExtractorRegistry,
    metrics: AsyncMutex<Metrics>,
    rate_gate: AsyncMutex<()>,
    results: AsyncMutex<ResultStore>,
    config: CoordinatorConfig,
    cleaned_up: AtomicBool,
}

impl<F: RobotsFetcher> Coordinator<F> {
    /// Validate and enqueue `tasks`, wiring up the cache/circuit/robots
    /// components from `config`.
    pub async fn new(
        tasks: Vec<Task>,
        config: CoordinatorConfig,
        robots_fetcher: F,
        extractors: ExtractorRegistry,
    ) -> Result<Self, CoordinatorError> {
        crate::validate::validate_tasks(&tasks)?;

        let queue = PriorityQueue::new(config.max_queue_size);
        queue.push_many(tasks).await?;

        let cache = ResultCache::open(config.cache_dir.clone(), config.cache_size).await;
        let circuit = CircuitBreaker::new(config.circuit_breaker_threshold);
        let robots = crate::robots::RobotsPolicy::new(robots_fetcher);

        Ok(Self {
            queue,
            cache,
            circuit,
            robots,
            extractors,
            metrics: AsyncMutex::new(Metrics::new()),
            rate_gate: AsyncMutex::new(()),
            results: AsyncMutex::new(ResultStore::new()),
            config,
            cleaned_up: AtomicBool::new(false),
        })
    }

    pub async fn add_task(&self, task: Task) -> Result<(), CoordinatorError> {
        self.add_tasks(vec![task]).await
    }

    pub async fn add_tasks(&self, tasks: Vec<Task>) -> Result<(), CoordinatorError> {
        crate::validate::validate_tasks(&tasks)?;
        self.queue.push_many(tasks).await
    }

    fn executor_context(&self, enable_cache: bool) -> ExecutorContext<'_, F> {
        ExecutorContext {
            cache: &self.cache,
            circuit: &self.circuit,
            robots: &self.robots,
            extractors: &self.extractors,
            metrics: &self.metrics,
            rate_gate: &self.rate_gate,
            delay_between_requests: self.config.delay_between_requests,
            max_retries: self.config.max_retries,
            enable_cache,
            respect_robots_txt: self.config.respect_robots_txt,
            default_timeout: self.config.default_timeout,
        }
    }

    /// Drain the queue and execute every task currently in it.
    pub async fn run(&self) -> RunEnvelope {
        let start = std::time::Instant::now();
        let ctx = self.executor_context(self.config.enable_cache);
        let observer = self.config.show_progress.then(|| LoggingProgress as &dyn ProgressObserver);

        let batch = pool::drain(&self.queue, self.config.max_workers, observer, |task| {
            executor::execute(&ctx, task)
        })
        .await;

        let mut results = self.results.lock().await;
        for result in &batch {
            if let Some(hook) = &self.config.on_success
                && result.is_success()
            {
                hook(result);
            }
            if let Some(hook) = &self.config.on_error
                && !result.is_success()
            {
                // The reconstructed task is only available at retry time;
                // for the primary run we pass the URL-bearing error text.
                hook(
                    &Task {
                        url: result.url().to_string(),
                        task_type: crate::task::TaskType::Dynamic,
                        subtype: crate::task::DynamicSubtype::ECommerce,
                        priority: 0,
                        timeout: None,
                        params: crate::task::TaskParams::default(),
                    },
                    &format!("{result:?}"),
                );
            }
            results.push(result.clone());
        }

        if let Some(hook) = &self.config.on_complete {
            hook();
        }

        let metrics = self.metrics.lock().await;
        RunEnvelope {
            results: batch,
            metrics: metrics.snapshot(),
            cache_hit_rate: metrics.cache_hit_rate(),
            duration_secs: start.elapsed().as_secs_f64(),
        }
    }

    /// Re-execute the subset of failures that are not circuit-blocked and
    /// still pass validation, with caching disabled (per DESIGN.md Open
    /// Question (b)) and a reset timeout (Open Question (d)).
    pub async fn retry_failed(&self) -> Result<RunEnvelope, CoordinatorError> {
        let retry_tasks: Vec<Task> = {
            let results = self.results.lock().await;
            results
                .failures()
                .iter()
                .filter_map(|r| r.to_retry_task(self.config.default_timeout))
                .collect()
        };

        crate::validate::validate_tasks(&retry_tasks)?;
        self.queue.push_many(retry_tasks).await?;

        let start = std::time::Instant::now();
        let ctx = self.executor_context(false);
        let batch = pool::drain(&self.queue, self.config.max_workers, None, |task| {
            executor::execute(&ctx, task)
        })
        .await;

        let mut results = self.results.lock().await;
        for result in &batch {
            results.push(result.clone());
        }

        let metrics = self.metrics.lock().await;
        Ok(RunEnvelope {
            results: batch,
            metrics: metrics.snapshot(),
            cache_hit_rate: metrics.cache_hit_rate(),
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub fn reset_circuit(&self, url: Option<&str>) {
        self.circuit.reset(url);
    }

    #[must_use]
    pub fn circuit_status(&self) -> std::collections::HashMap<String, u32> {
        self.circuit.status()
    }

    pub async fn export_results(
        &self,
        format: ExportFormat,
        path: Option<PathBuf>,
    ) -> anyhow::Result<PathBuf> {
        let results = self.results.lock().await;
        results.export(format, path, chrono::Utc::now())
    }

    pub async fn successes(&self) -> Vec<TaskResult> {
        self.results.lock().await.successes().into_iter().cloned().collect()
    }

    pub async fn failures(&self) -> Vec<TaskResult> {
        self.results.lock().await.failures().into_iter().cloned().collect()
    }

    /// Idempotent: release the cache, queue, and circuit registry. Safe
    /// to call more than once.
    pub async fn cleanup(&self) {
        if self.cleaned_up.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.clear().await;
        self.cache.clear().await;
        self.circuit.reset(None);
        self.results.lock().await.clear();
    }
}

struct LoggingProgress;
impl ProgressObserver for LoggingProgress {
    fn on_progress(&self, completed: usize, total: usize) {
        log::info!("progress: {completed}/{total}");
    }
}
