//! C8 — worker pool driver.
//!
//! Drains the queue into a bounded pool of `max_workers` concurrent
//! executions, matching the teacher's `FuturesUnordered`-driven main loop
//! in `orchestrator.rs` (simplified: no per-domain limiter, since the
//! coordinator's rate limiting is a single global delay, not per-domain).

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::queue::PriorityQueue;
use crate::result::TaskResult;

/// Reports progress as tasks complete. Invoked on the worker that
/// finished a task; must not block.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize);
}

/// Drain every currently-queued task through `run_one`, bounded to
/// `max_workers` concurrent executions. Tasks already in the queue when
/// this is called are the entire batch — tasks are consumed exactly
/// once; a re-run against an empty queue returns an empty vec.
pub async fn drain<Fut>(
    queue: &PriorityQueue,
    max_workers: usize,
    observer: Option<&dyn ProgressObserver>,
    run_one: impl Fn(crate::task::Task) -> Fut,
) -> Vec<TaskResult>
where
    Fut: std::future::Future<Output = TaskResult>,
{
    let total = queue.size().await;
    if total == 0 {
        return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(max_workers));
    let mut in_flight = FuturesUnordered::new();
    let mut results = Vec::with_capacity(total);
    let mut completed = 0usize;

    while let Some(task) = queue.pop().await {
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        let fut = run_one(task);
        in_flight.push(async move {
            let result = fut.await;
            drop(permit);
            result
        });

        // Keep at most `max_workers` in flight at once: once the pool is
        // saturated, wait for one to finish before popping the next task.
        if in_flight.len() >= max_workers {
            if let Some(result) = in_flight.next().await {
                completed += 1;
                if let Some(observer) = observer {
                    observer.on_progress(completed, total);
                }
                results.push(result);
            }
        }
    }

    while let Some(result) = in_flight.next().await {
        completed += 1;
        if let Some(observer) = observer {
            observer.on_progress(completed, total);
        }
        results.push(result);
    }

    results
}
