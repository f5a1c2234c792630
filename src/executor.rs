//! C7 — per-task executor, the central algorithm.
//!
//! Ports `process_task` from the original almost step for step: circuit
//! check, cache check, robots check, a serialized rate-limit delay, then
//! a retry loop that classifies each failure and either backs off and
//! retries or breaks immediately. Grounded in the teacher's
//! `with_page_timeout` for deadline enforcement and
//! `calculate_retry_backoff` for the backoff shape, simplified to the
//! plain `2^attempt` seconds the original uses (no jitter — see
//! DESIGN.md).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;

use crate::cache::ResultCache;
use crate::circuit_breaker::CircuitBreaker;
use crate::error::ErrorKind;
use crate::extractor::ExtractorRegistry;
use crate::metrics::Metrics;
use crate::result::{TaskMetrics, TaskResult};
use crate::robots::RobotsPolicy;
use crate::task::{DynamicSubtype, Task};

/// Per-page time budget for e-commerce stores known to be slow (each
/// scroll waits 5s), matching the original's `alkosto` special-case.
const SLOW_STORE_PER_PAGE_BUDGET: Duration = Duration::from_secs(25);
const DEFAULT_PER_PAGE_BUDGET: Duration = Duration::from_secs(15);
const SLOW_STORE_NAME: &str = "alkosto";

/// Everything C7 needs, borrowed from the coordinator for the duration
/// of one task execution. Grouped into a struct so `execute` doesn't
/// need a dozen parameters.
pub struct ExecutorContext<'a, F> {
    pub cache: &'a ResultCache,
    pub circuit: &'a CircuitBreaker,
    pub robots: &'a RobotsPolicy<F>,
    pub extractors: &'a ExtractorRegistry,
    pub metrics: &'a AsyncMutex<Metrics>,
    pub rate_gate: &'a AsyncMutex<()>,
    pub delay_between_requests: Duration,
    pub max_retries: u32,
    pub enable_cache: bool,
    pub respect_robots_txt: bool,
    pub default_timeout: Duration,
}

fn effective_timeout(task: &Task, default_timeout: Duration) -> Duration {
    let base = task.timeout.unwrap_or(default_timeout);
    if task.subtype != DynamicSubtype::ECommerce {
        return base;
    }

    let max_paginas = task.params.max_paginas.unwrap_or(1).max(1);
    let per_page_budget = match task.params.tienda.as_deref() {
        Some(t) if t.eq_ignore_ascii_case(SLOW_STORE_NAME) => SLOW_STORE_PER_PAGE_BUDGET,
        _ => DEFAULT_PER_PAGE_BUDGET,
    };
    base.max(per_page_budget * max_paginas)
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Execute one task end to end, producing exactly one `TaskResult`.
pub async fn execute<F: crate::robots::RobotsFetcher>(
    ctx: &ExecutorContext<'_, F>,
    task: Task,
) -> TaskResult {
    let start = Instant::now();
    let timeout = effective_timeout(&task, ctx.default_timeout);

    if ctx.circuit.is_open(&task.url) {
        ctx.metrics.lock().await.record_circuit_block();
        return failure(
            &task,
            "circuit breaker open".to_string(),
            ErrorKind::CircuitOpen,
            0,
            start.elapsed(),
            true,
        );
    }

    let fingerprint = task.fingerprint();
    if ctx.enable_cache {
        match ctx.cache.get(fingerprint).await {
            Some(cached) => {
                ctx.metrics.lock().await.record_cache_hit();
                return cached.as_cache_hit();
            }
            None => ctx.metrics.lock().await.record_cache_miss(),
        }
    }

    if ctx.respect_robots_txt && !ctx.robots.is_allowed(&task.url).await {
        let mut metrics = ctx.metrics.lock().await;
        metrics.record_failure(&task.url, start.elapsed().as_secs_f64());
        return failure(
            &task,
            format!("robots.txt disallows {}", task.url),
            ErrorKind::RobotsBlocked,
            0,
            start.elapsed(),
            false,
        );
    }

    {
        let _guard = ctx.rate_gate.lock().await;
        if ctx.delay_between_requests > Duration::ZERO {
            tokio::time::sleep(ctx.delay_between_requests).await;
        }
    }

    let Some(extractor) = ctx.extractors.get(task.task_type, task.subtype) else {
        let mut metrics = ctx.metrics.lock().await;
        metrics.record_failure(&task.url, start.elapsed().as_secs_f64());
        return failure(
            &task,
            format!("no extractor registered for subtype {}", task.subtype),
            ErrorKind::ParseOrValue,
            0,
            start.elapsed(),
            false,
        );
    };

    let mut last_error: Option<(String, ErrorKind)> = None;
    let mut attempts = 0u32;

    for attempt in 0..ctx.max_retries {
        attempts = attempt + 1;
        match tokio::time::timeout(timeout, extractor.extract(&task)).await {
            Ok(Ok(data)) => {
                ctx.circuit.record_success(&task.url);
                let result = TaskResult::Success {
                    url: task.url.clone(),
                    task_type: task.task_type,
                    subtype: task.subtype,
                    priority: task.priority,
                    data,
                    from_cache: false,
                    metrics: TaskMetrics {
                        duration_secs: start.elapsed().as_secs_f64(),
                        attempts,
                    },
                };
                if ctx.enable_cache {
                    ctx.cache
                        .set(fingerprint, result.clone(), chrono::Utc::now())
                        .await;
                }
                ctx.metrics
                    .lock()
                    .await
                    .record_success(&task.url, start.elapsed().as_secs_f64());
                return result;
            }
            Ok(Err(err)) => {
                let kind = err.kind();
                last_error = Some((err.to_string(), kind));
                if !kind.is_retryable() {
                    break;
                }
                if attempt + 1 < ctx.max_retries {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
            Err(_elapsed) => {
                last_error = Some((format!("timeout after {timeout:?}"), ErrorKind::Timeout));
                // Timeout is retryable with no backoff, matching the
                // original: it just loops immediately to the next attempt.
            }
        }
    }

    ctx.circuit.record_failure(&task.url);
    let (message, kind) = last_error.unwrap_or((
        "exhausted retries with no recorded error".to_string(),
        ErrorKind::Unknown,
    ));
    let mut metrics = ctx.metrics.lock().await;
    metrics.record_failure(&task.url, start.elapsed().as_secs_f64());
    failure(&task, message, kind, attempts, start.elapsed(), false)
}

fn failure(
    task: &Task,
    error: String,
    error_kind: ErrorKind,
    attempts: u32,
    elapsed: Duration,
    circuit_breaker: bool,
) -> TaskResult {
    TaskResult::Failure {
        url: task.url.clone(),
        error,
        error_kind,
        task_type: task.task_type,
        subtype: task.subtype,
        priority: task.priority,
        metrics: TaskMetrics {
            duration_secs: elapsed.as_secs_f64(),
            attempts,
        },
        circuit_breaker,
    }
}

impl TaskResult {
    /// Clone a cached result as a fresh cache-hit: `from_cache=true`,
    /// `attempts=0`, matching S2.
    fn as_cache_hit(&self) -> Self {
        match self.clone() {
            Self::Success {
                url,
                task_type,
                subtype,
                priority,
                data,
                metrics,
                ..
            } => Self::Success {
                url,
                task_type,
                subtype,
                priority,
                data,
                from_cache: true,
                metrics: TaskMetrics {
                    duration_secs: metrics.duration_secs,
                    attempts: 0,
                },
            },
            other => other,
        }
    }
}
