//! C2 — size-bounded, persistent LRU result cache.
//!
//! Keyed by `Task::fingerprint()`. Access reorders the LRU list, eviction
//! happens on insert once `max_size` is exceeded. The whole map is
//! serialized to disk on every mutating operation (matching the
//! original's `LRUCache`, which pickles itself on every `set`/`clear`) —
//! simple and correct at the size this cache is meant to run at; see
//! SPEC_FULL.md §5 C2 for the tradeoff.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::result::TaskResult;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    result: TaskResult,
    cached_at: chrono::DateTime<chrono::Utc>,
}

/// On-disk representation: insertion order is oldest-first, matching
/// `LruCache`'s iteration order.
#[derive(Serialize, Deserialize)]
struct OnDisk {
    entries: Vec<(u64, CacheEntry)>,
}

/// Snapshot returned by `ResultCache::info()`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub entries: usize,
    pub max_size: usize,
    pub disk_size_bytes: u64,
    pub path: PathBuf,
    pub oldest: Option<chrono::DateTime<chrono::Utc>>,
    pub newest: Option<chrono::DateTime<chrono::Utc>>,
}

struct Inner {
    lru: LruCache<u64, CacheEntry>,
}

pub struct ResultCache {
    inner: Mutex<Inner>,
    max_size: usize,
    path: PathBuf,
}

impl ResultCache {
    /// Open (or create) a cache backed by `path`, loading any entries
    /// already on disk. A corrupt or unreadable cache file is treated as
    /// empty rather than failing construction — a stale cache is not
    /// worth refusing to start over.
    pub async fn open(path: impl Into<PathBuf>, max_size: usize) -> Self {
        let path = path.into();
        let cap = NonZeroUsize::new(max_size.max(1)).unwrap();
        let mut lru = LruCache::new(cap);

        if let Ok(bytes) = tokio::fs::read(&path).await
            && let Ok(on_disk) = serde_json::from_slice::<OnDisk>(&bytes)
        {
            for (key, entry) in on_disk.entries {
                lru.put(key, entry);
            }
        }

        Self {
            inner: Mutex::new(Inner { lru }),
            max_size,
            path,
        }
    }

    /// Look up a cached result by fingerprint, promoting it to
    /// most-recently-used on hit.
    pub async fn get(&self, fingerprint: u64) -> Option<TaskResult> {
        let mut inner = self.inner.lock().await;
        inner.lru.get(&fingerprint).map(|e| e.result.clone())
    }

    /// Insert or overwrite a cached result, evicting the least-recently-used
    /// entry if the cache was already at capacity. Persists to disk before
    /// returning.
    pub async fn set(&self, fingerprint: u64, result: TaskResult, now: chrono::DateTime<chrono::Utc>) {
        let mut inner = self.inner.lock().await;
        inner.lru.put(
            fingerprint,
            CacheEntry {
                result,
                cached_at: now,
            },
        );
        self.persist(&inner).await;
    }

    /// Empty the in-memory cache and persist a well-formed, empty on-disk
    /// file (not remove it — a reader that tails the cache path should
    /// never see a missing file after a clear, only an empty one).
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.lru.clear();
        self.persist(&inner).await;
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.lru.len()
    }

    /// Diagnostic snapshot matching the original's `get_cache_info`.
    pub async fn info(&self) -> CacheInfo {
        let inner = self.inner.lock().await;
        let disk_size_bytes = tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let mut oldest = None;
        let mut newest = None;
        for (_, entry) in inner.lru.iter() {
            oldest = Some(oldest.map_or(entry.cached_at, |o: chrono::DateTime<chrono::Utc>| o.min(entry.cached_at)));
            newest = Some(newest.map_or(entry.cached_at, |n: chrono::DateTime<chrono::Utc>| n.max(entry.cached_at)));
        }

        CacheInfo {
            entries: inner.lru.len(),
            max_size: self.max_size,
            disk_size_bytes,
            path: self.path.clone(),
            oldest,
            newest,
        }
    }

    async fn persist(&self, inner: &Inner) {
        // `iter()` walks most-recently-used first; reverse so reloading
        // (which `put`s in order) reconstructs the same MRU ordering.
        let mut entries: Vec<(u64, &CacheEntry)> = inner
            .lru
            .iter()
            .map(|(k, v)| (*k, v))
            .collect();
        entries.reverse();
        let on_disk = OnDiskRef { entries: &entries };

        if let Some(parent) = self.path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Ok(json) = serde_json::to_vec(&on_disk) {
            let _ = tokio::fs::write(&self.path, json).await;
        }
    }
}

#[derive(Serialize)]
struct OnDiskRef<'a> {
    entries: &'a [(u64, &'a CacheEntry)],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::TaskMetrics;
    use crate::task::{DynamicSubtype, TaskType};
    use tempfile::tempdir;

    fn result(url: &str) -> TaskResult {
        TaskResult::Success {
            url: url.to_string(),
            task_type: TaskType::Dynamic,
            subtype: DynamicSubtype::ECommerce,
            priority: 0,
            data: serde_json::json!({}),
            from_cache: false,
            metrics: TaskMetrics {
                duration_secs: 0.1,
                attempts: 1,
            },
        }
    }

    fn path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("cache.json")
    }

    #[tokio::test]
    async fn hit_after_set_and_miss_before() {
        let dir = tempdir().unwrap();
        let cache = ResultCache::open(path(&dir), 10).await;

        assert!(cache.get(1).await.is_none());
        cache.set(1, result("https://a"), chrono::Utc::now()).await;
        assert!(cache.get(1).await.is_some());
    }

    #[tokio::test]
    async fn evicts_least_recently_used_at_capacity() {
        let dir = tempdir().unwrap();
        let cache = ResultCache::open(path(&dir), 2).await;

        cache.set(1, result("https://a"), chrono::Utc::now()).await;
        cache.set(2, result("https://b"), chrono::Utc::now()).await;
        // touch 1 so 2 becomes the LRU victim
        cache.get(1).await;
        cache.set(3, result("https://c"), chrono::Utc::now()).await;

        assert!(cache.get(1).await.is_some());
        assert!(cache.get(2).await.is_none());
        assert!(cache.get(3).await.is_some());
        assert_eq!(cache.size().await, 2);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let p = path(&dir);
        {
            let cache = ResultCache::open(&p, 10).await;
            cache.set(1, result("https://a"), chrono::Utc::now()).await;
        }

        let reopened = ResultCache::open(&p, 10).await;
        assert!(reopened.get(1).await.is_some());
    }

    #[tokio::test]
    async fn clear_empties_cache_and_removes_file() {
        let dir = tempdir().unwrap();
        let p = path(&dir);
        let cache = ResultCache::open(&p, 10).await;
        cache.set(1, result("https://a"), chrono::Utc::now()).await;

        cache.clear().await;

        assert_eq!(cache.size().await, 0);
        let on_disk: OnDisk = serde_json::from_slice(&tokio::fs::read(&p).await.unwrap()).unwrap();
        assert!(on_disk.entries.is_empty());
    }
}
