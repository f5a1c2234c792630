//! End-to-end scenarios exercised through the public `Coordinator` façade,
//! covering the cases the unit tests inside each module don't already
//! drive through the whole stack.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use scrape_coordinator::{
    AlwaysAllow, Coordinator, CoordinatorConfig, DynamicSubtype, ErrorKind, ExportFormat,
    ExtractError, Extractor, ExtractorRegistry, Task, TaskParams, TaskType,
};
use tempfile::tempdir;

fn task(url: &str, priority: u32) -> Task {
    Task {
        url: url.to_string(),
        task_type: TaskType::Dynamic,
        subtype: DynamicSubtype::ECommerce,
        priority,
        timeout: None,
        params: TaskParams::default(),
    }
}

struct CountingExtractor {
    calls: AtomicU32,
}

#[async_trait]
impl Extractor for CountingExtractor {
    async fn extract(&self, task: &Task) -> Result<serde_json::Value, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({ "url": task.url }))
    }
}

struct AlwaysParseError;
#[async_trait]
impl Extractor for AlwaysParseError {
    async fn extract(&self, _task: &Task) -> Result<serde_json::Value, ExtractError> {
        Err(ExtractError::ParseOrValue("missing field 'precio'".to_string()))
    }
}

struct FailsTwiceThenSucceeds {
    remaining: AtomicU32,
}
#[async_trait]
impl Extractor for FailsTwiceThenSucceeds {
    async fn extract(&self, task: &Task) -> Result<serde_json::Value, ExtractError> {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
            Err(ExtractError::Other("transient timeout-like failure".to_string()))
        } else {
            Ok(serde_json::json!({ "url": task.url }))
        }
    }
}

fn registry(extractor: Arc<dyn Extractor>) -> ExtractorRegistry {
    let mut r = ExtractorRegistry::new();
    r.register(TaskType::Dynamic, DynamicSubtype::ECommerce, extractor);
    r
}

#[tokio::test]
async fn s2_second_identical_task_is_a_cache_hit() {
    let dir = tempdir().unwrap();
    let config = CoordinatorConfig::builder()
        .cache_dir(dir.path().join("cache.json"))
        .max_workers(1)
        .build()
        .unwrap();

    let extractor = Arc::new(CountingExtractor {
        calls: AtomicU32::new(0),
    });

    let coordinator = Coordinator::new(
        vec![
            task("https://example.com/dup", 0),
            task("https://example.com/dup", 0),
        ],
        config,
        AlwaysAllow,
        registry(extractor.clone()),
    )
    .await
    .unwrap();

    let envelope = coordinator.run().await;
    assert_eq!(envelope.results.len(), 2);

    match &envelope.results[0] {
        scrape_coordinator::TaskResult::Success { from_cache, .. } => assert!(!from_cache),
        _ => panic!("expected success"),
    }
    match &envelope.results[1] {
        scrape_coordinator::TaskResult::Success { from_cache, metrics, .. } => {
            assert!(from_cache);
            assert_eq!(metrics.attempts, 0);
        }
        _ => panic!("expected cache-hit success"),
    }

    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(envelope.metrics.cached, 1);
    assert_eq!(envelope.metrics.cache_misses, 1);
}

struct SleepsBriefly;
#[async_trait]
impl Extractor for SleepsBriefly {
    async fn extract(&self, task: &Task) -> Result<serde_json::Value, ExtractError> {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        Ok(serde_json::json!({ "url": task.url }))
    }
}

#[tokio::test]
async fn run_succeeds_for_a_task_with_no_timeout_using_the_configured_default() {
    // A task with `timeout: None` has nothing to fall back on but
    // `CoordinatorConfig::default_timeout`; this exercises that whole
    // path end to end through the public façade rather than assuming the
    // field is wired correctly.
    let dir = tempdir().unwrap();
    let config = CoordinatorConfig::builder()
        .cache_dir(dir.path().join("cache.json"))
        .max_workers(1)
        .default_timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap();

    let coordinator = Coordinator::new(
        vec![task("https://example.com/default-timeout", 0)],
        config,
        AlwaysAllow,
        registry(Arc::new(SleepsBriefly)),
    )
    .await
    .unwrap();

    let envelope = coordinator.run().await;
    assert_eq!(envelope.results.len(), 1);
    assert!(envelope.results[0].is_success());
}

#[tokio::test]
async fn s4_retry_then_succeed_records_three_attempts() {
    let dir = tempdir().unwrap();
    let config = CoordinatorConfig::builder()
        .cache_dir(dir.path().join("cache.json"))
        .max_workers(1)
        .max_retries(3)
        .build()
        .unwrap();

    let coordinator = Coordinator::new(
        vec![task("https://example.com/retry", 0)],
        config,
        AlwaysAllow,
        registry(Arc::new(FailsTwiceThenSucceeds {
            remaining: AtomicU32::new(2),
        })),
    )
    .await
    .unwrap();

    let envelope = coordinator.run().await;
    assert_eq!(envelope.results.len(), 1);
    assert!(envelope.results[0].is_success());
    assert_eq!(envelope.results[0].metrics().attempts, 3);
}

#[tokio::test]
async fn s5_non_retryable_failure_stops_after_one_attempt() {
    let dir = tempdir().unwrap();
    let config = CoordinatorConfig::builder()
        .cache_dir(dir.path().join("cache.json"))
        .max_workers(1)
        .max_retries(3)
        .build()
        .unwrap();

    let coordinator = Coordinator::new(
        vec![task("https://example.com/bad-field", 0)],
        config,
        AlwaysAllow,
        registry(Arc::new(AlwaysParseError)),
    )
    .await
    .unwrap();

    let envelope = coordinator.run().await;
    assert_eq!(envelope.results.len(), 1);
    assert!(!envelope.results[0].is_success());
    assert_eq!(envelope.results[0].metrics().attempts, 1);

    match &envelope.results[0] {
        scrape_coordinator::TaskResult::Failure { error_kind, .. } => {
            assert_eq!(*error_kind, ErrorKind::ParseOrValue);
        }
        _ => panic!("expected failure"),
    }
}

#[tokio::test]
async fn retry_failed_skips_circuit_blocked_and_resets_timeout() {
    let dir = tempdir().unwrap();
    let config = CoordinatorConfig::builder()
        .cache_dir(dir.path().join("cache.json"))
        .max_workers(1)
        .max_retries(1)
        .circuit_breaker_threshold(5)
        .build()
        .unwrap();

    let coordinator = Coordinator::new(
        vec![task("https://example.com/flaky-once", 0)],
        config,
        AlwaysAllow,
        registry(Arc::new(AlwaysParseError)),
    )
    .await
    .unwrap();

    // A single non-retryable failure doesn't reach the circuit-breaker
    // threshold (5), so the retried task still reaches the extractor.
    let first = coordinator.run().await;
    assert_eq!(first.results.len(), 1);
    assert!(!first.results[0].circuit_breaker_blocked());

    let retried = coordinator.retry_failed().await.unwrap();
    assert_eq!(retried.results.len(), 1);
    assert!(!retried.results[0].circuit_breaker_blocked());
}

#[tokio::test]
async fn export_json_round_trips_result_list() {
    let dir = tempdir().unwrap();
    let config = CoordinatorConfig::builder()
        .cache_dir(dir.path().join("cache.json"))
        .max_workers(1)
        .build()
        .unwrap();

    let coordinator = Coordinator::new(
        vec![task("https://example.com/a", 0), task("https://example.com/b", 1)],
        config,
        AlwaysAllow,
        registry(Arc::new(CountingExtractor {
            calls: AtomicU32::new(0),
        })),
    )
    .await
    .unwrap();

    coordinator.run().await;
    let export_path = dir.path().join("export.json");
    coordinator
        .export_results(ExportFormat::Json, Some(export_path.clone()))
        .await
        .unwrap();

    let contents = std::fs::read_to_string(&export_path).unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed.len(), 2);
}

struct FailsFirstCallThenSucceeds {
    calls: AtomicU32,
}
#[async_trait]
impl Extractor for FailsFirstCallThenSucceeds {
    async fn extract(&self, task: &Task) -> Result<serde_json::Value, ExtractError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ExtractError::Other("first call always fails".to_string()))
        } else {
            Ok(serde_json::json!({ "url": task.url }))
        }
    }
}

#[tokio::test]
async fn reset_circuit_allows_a_blocked_url_to_be_attempted_again() {
    let dir = tempdir().unwrap();
    let config = CoordinatorConfig::builder()
        .cache_dir(dir.path().join("cache.json"))
        .max_workers(1)
        .max_retries(1)
        .circuit_breaker_threshold(1)
        .build()
        .unwrap();

    let extractor = Arc::new(FailsFirstCallThenSucceeds {
        calls: AtomicU32::new(0),
    });
    let url = "https://example.com/reset-me";

    let coordinator = Coordinator::new(
        vec![task(url, 0)],
        config,
        AlwaysAllow,
        registry(extractor.clone()),
    )
    .await
    .unwrap();

    let first = coordinator.run().await;
    assert!(!first.results[0].is_success());
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

    // Circuit is now open (threshold=1): the next attempt is blocked
    // without reaching the extractor.
    coordinator.add_task(task(url, 0)).await.unwrap();
    let blocked = coordinator.run().await;
    assert!(blocked.results[0].circuit_breaker_blocked());
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

    coordinator.reset_circuit(Some(url));
    coordinator.add_task(task(url, 0)).await.unwrap();
    let after_reset = coordinator.run().await;

    assert!(!after_reset.results[0].circuit_breaker_blocked());
    assert!(after_reset.results[0].is_success());
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
}
