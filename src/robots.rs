//! C3 — robots.txt policy cache.
//!
//! Mirrors the original's `is_allowed_by_robots`: a hard-coded bypass
//! whitelist of Mercado Libre hosts that always short-circuits to
//! allowed, and fail-open behavior (a fetch error is treated as
//! "allowed") so a flaky robots.txt endpoint never blocks scraping.
//!
//! Fetching robots.txt itself is out of scope for this crate (no HTTP
//! client dependency) — it is delegated to a pluggable `RobotsFetcher`
//! so a caller can wire in whatever HTTP stack it already uses.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use url::Url;

/// Hosts that bypass the robots.txt check entirely, matching the
/// original's hard-coded allowlist.
const BYPASS_HOSTS: &[&str] = &[
    "mercadolibre.com.co",
    "listado.mercadolibre.com.co",
    "mercadolibre.com",
    "listado.mercadolibre.com",
];

/// Fetches and parses a single origin's robots.txt, answering whether a
/// given path is allowed for the coordinator's user agent.
#[async_trait]
pub trait RobotsFetcher: Send + Sync {
    async fn is_allowed(&self, url: &str) -> anyhow::Result<bool>;
}

/// Per-origin (`scheme://host[:port]`) robots.txt decision cache, keyed
/// the same way the original keys its `RobotFileParser` cache off
/// `f"{parsed.scheme}://{parsed.netloc}"` — one fetch per origin, not one
/// per distinct path.
pub struct RobotsPolicy<F> {
    fetcher: F,
    bypass: HashSet<&'static str>,
    cache: DashMap<String, bool>,
}

/// `scheme://host[:port]`, matching the original's `base_url` key.
fn origin(parsed: &Url, host: &str) -> String {
    match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    }
}

impl<F: RobotsFetcher> RobotsPolicy<F> {
    #[must_use]
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            bypass: BYPASS_HOSTS.iter().copied().collect(),
            cache: DashMap::new(),
        }
    }

    /// Whether `url` may be fetched. Fail-open: a malformed URL or a
    /// fetcher error is reported as allowed, never as a block.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let Some(host) = parsed.host_str() else {
            return true;
        };

        if self.bypass.contains(host) {
            return true;
        }

        let origin = origin(&parsed, host);

        if let Some(cached) = self.cache.get(&origin) {
            return *cached;
        }

        let allowed = self.fetcher.is_allowed(url).await.unwrap_or(true);
        self.cache.insert(origin, allowed);
        allowed
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// A `RobotsFetcher` that always allows — used where the coordinator is
/// configured with `respect_robots_txt = false`, and in tests.
pub struct AlwaysAllow;

#[async_trait]
impl RobotsFetcher for AlwaysAllow {
    async fn is_allowed(&self, _url: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysDeny;
    #[async_trait]
    impl RobotsFetcher for AlwaysDeny {
        async fn is_allowed(&self, _url: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    struct AlwaysError;
    #[async_trait]
    impl RobotsFetcher for AlwaysError {
        async fn is_allowed(&self, _url: &str) -> anyhow::Result<bool> {
            anyhow::bail!("robots.txt fetch failed")
        }
    }

    #[tokio::test]
    async fn bypass_hosts_are_always_allowed_even_when_fetcher_denies() {
        let policy = RobotsPolicy::new(AlwaysDeny);
        assert!(
            policy
                .is_allowed("https://listado.mercadolibre.com.co/search?q=tv")
                .await
        );
    }

    #[tokio::test]
    async fn non_bypass_host_defers_to_fetcher() {
        let policy = RobotsPolicy::new(AlwaysDeny);
        assert!(!policy.is_allowed("https://example.com/page").await);
    }

    #[tokio::test]
    async fn fetch_error_fails_open() {
        let policy = RobotsPolicy::new(AlwaysError);
        assert!(policy.is_allowed("https://example.com/page").await);
    }

    #[tokio::test]
    async fn decision_is_cached_after_first_lookup() {
        let policy = RobotsPolicy::new(AlwaysAllow);
        assert!(policy.is_allowed("https://example.com/a").await);
        assert!(policy.cache.contains_key("https://example.com"));
    }

    struct CountingFetcher {
        calls: std::sync::atomic::AtomicU32,
    }
    #[async_trait]
    impl RobotsFetcher for CountingFetcher {
        async fn is_allowed(&self, _url: &str) -> anyhow::Result<bool> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(true)
        }
    }

    #[tokio::test]
    async fn two_paths_on_one_origin_share_a_single_fetch() {
        let policy = RobotsPolicy::new(CountingFetcher {
            calls: std::sync::atomic::AtomicU32::new(0),
        });

        assert!(policy.is_allowed("https://example.com/a").await);
        assert!(policy.is_allowed("https://example.com/b?x=1").await);

        assert_eq!(
            policy.fetcher.calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }
}
