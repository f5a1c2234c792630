//! C1 — thread-safe bounded priority queue.
//!
//! Keyed by `(priority, enqueue_seq)`: lower priority value pops first;
//! ties broken FIFO by insertion order. Backed by `std::BinaryHeap` (a
//! max-heap), so entries are wrapped in `Reverse` to get min-heap
//! behavior over `(priority, enqueue_seq)`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::error::CoordinatorError;
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    priority: u32,
    enqueue_seq: u64,
}

struct Entry {
    key: OrderKey,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

/// Bounded min-heap priority queue over tasks.
pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<Reverse<Entry>>>,
    seq: AtomicU64,
    max_size: usize,
}

impl PriorityQueue {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
            max_size,
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Push a single task. Fails with `QueueFull` if the queue is at
    /// capacity; state is left unchanged on failure.
    pub async fn push(&self, task: Task) -> Result<(), CoordinatorError> {
        let mut heap = self.heap.lock().await;
        if heap.len() >= self.max_size {
            return Err(CoordinatorError::QueueFull {
                attempted: 1,
                available: self.max_size - heap.len(),
            });
        }
        let key = OrderKey {
            priority: task.priority,
            enqueue_seq: self.next_seq(),
        };
        heap.push(Reverse(Entry { key, task }));
        Ok(())
    }

    /// Push a batch atomically with respect to capacity: either every
    /// task fits, or none is inserted.
    pub async fn push_many(&self, tasks: Vec<Task>) -> Result<(), CoordinatorError> {
        let mut heap = self.heap.lock().await;
        if heap.len() + tasks.len() > self.max_size {
            return Err(CoordinatorError::QueueFull {
                attempted: tasks.len(),
                available: self.max_size - heap.len(),
            });
        }
        for task in tasks {
            let key = OrderKey {
                priority: task.priority,
                enqueue_seq: self.next_seq(),
            };
            heap.push(Reverse(Entry { key, task }));
        }
        Ok(())
    }

    /// Pop the task with the least `(priority, enqueue_seq)`.
    pub async fn pop(&self) -> Option<Task> {
        let mut heap = self.heap.lock().await;
        heap.pop().map(|Reverse(entry)| entry.task)
    }

    /// Peek the next task to be popped, without removing it.
    pub async fn peek(&self) -> Option<Task> {
        let heap = self.heap.lock().await;
        heap.peek().map(|Reverse(entry)| entry.task.clone())
    }

    pub async fn size(&self) -> usize {
        self.heap.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.heap.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.heap.lock().await.clear();
    }
}
