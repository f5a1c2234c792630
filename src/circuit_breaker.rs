//! C4 — per-URL circuit breaker.
//!
//! Simpler than the teacher's three-state (closed/half-open/open) domain
//! breaker: just `url -> consecutive_failure_count`, open once the count
//! reaches `threshold`, reset to closed on either a success or an
//! explicit `reset`/`reset_all` call. No half-open probing and no
//! timeout-based reintegration — see DESIGN.md Open Question (c).

use dashmap::DashMap;

/// Default threshold, matching the original's `_circuit_breaker_threshold`.
pub const DEFAULT_THRESHOLD: u32 = 5;

pub struct CircuitBreaker {
    failures: DashMap<String, u32>,
    threshold: u32,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            failures: DashMap::new(),
            threshold,
        }
    }

    #[must_use]
    pub fn is_open(&self, url: &str) -> bool {
        self.failures.get(url).is_some_and(|n| *n >= self.threshold)
    }

    pub fn record_failure(&self, url: &str) {
        let mut entry = self.failures.entry(url.to_string()).or_insert(0);
        *entry += 1;
    }

    pub fn record_success(&self, url: &str) {
        self.failures.remove(url);
    }

    /// Reset a single URL, or every tracked URL if `url` is `None`.
    pub fn reset(&self, url: Option<&str>) {
        match url {
            Some(url) => {
                self.failures.remove(url);
            }
            None => self.failures.clear(),
        }
    }

    /// Snapshot of `url -> consecutive_failure_count` for every tracked URL.
    #[must_use]
    pub fn status(&self) -> std::collections::HashMap<String, u32> {
        self.failures
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }
}
