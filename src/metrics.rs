//! C9 — online aggregate metrics.
//!
//! Updated incrementally after every task (success or failure), mirroring
//! the original's `_update_metrics`: a running total/average duration and
//! a fastest/slowest task, plus cache hit/miss and circuit-breaker-block
//! counters folded in as each result lands.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TaskTiming {
    pub url: String,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub success: u64,
    pub errors: u64,
    pub cached: u64,
    pub cache_misses: u64,
    pub circuit_breaker_blocks: u64,
    pub total_duration_secs: f64,
    pub avg_task_duration_secs: f64,
    pub fastest_task: Option<TaskTiming>,
    pub slowest_task: Option<TaskTiming>,
    /// Best-effort resident set size in MB; `None` when `/proc/self/statm`
    /// is unavailable (e.g. non-Linux).
    pub memory_usage_mb: Option<f64>,
}

/// Online accumulator. Not thread-safe on its own — the coordinator
/// guards it behind a mutex, matching the lock-order contract in
/// SPEC_FULL.md §6.
#[derive(Default)]
pub struct Metrics {
    snapshot: MetricsSnapshot,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, url: &str, duration_secs: f64) {
        self.snapshot.total += 1;
        self.snapshot.success += 1;
        self.record_duration(url, duration_secs);
    }

    pub fn record_failure(&mut self, url: &str, duration_secs: f64) {
        self.snapshot.total += 1;
        self.snapshot.errors += 1;
        self.record_duration(url, duration_secs);
    }

    pub fn record_cache_hit(&mut self) {
        self.snapshot.cached += 1;
    }

    pub fn record_cache_miss(&mut self) {
        self.snapshot.cache_misses += 1;
    }

    pub fn record_circuit_block(&mut self) {
        self.snapshot.circuit_breaker_blocks += 1;
    }

    fn record_duration(&mut self, url: &str, duration_secs: f64) {
        self.snapshot.total_duration_secs += duration_secs;
        self.snapshot.avg_task_duration_secs =
            self.snapshot.total_duration_secs / self.snapshot.total as f64;

        let is_faster = self
            .snapshot
            .fastest_task
            .as_ref()
            .is_none_or(|t| duration_secs < t.duration_secs);
        if is_faster {
            self.snapshot.fastest_task = Some(TaskTiming {
                url: url.to_string(),
                duration_secs,
            });
        }

        let is_slower = self
            .snapshot
            .slowest_task
            .as_ref()
            .is_none_or(|t| duration_secs > t.duration_secs);
        if is_slower {
            self.snapshot.slowest_task = Some(TaskTiming {
                url: url.to_string(),
                duration_secs,
            });
        }

        self.snapshot.memory_usage_mb = read_rss_mb();
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot.clone()
    }

    /// `hits / (hits + misses)`, matching spec.md's definition exactly —
    /// not hits over total results, since cache hits never reach
    /// `record_success`/`record_failure` at all.
    #[must_use]
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.snapshot.cached + self.snapshot.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.snapshot.cached as f64 / lookups as f64
        }
    }
}

/// Best-effort RSS reader via `/proc/self/statm` (Linux-only); returns
/// `None` anywhere the file doesn't exist rather than failing metrics
/// collection.
fn read_rss_mb() -> Option<f64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    let page_size = 4096u64;
    Some((pages * page_size) as f64 / (1024.0 * 1024.0))
}
