//! Coordinator policy and its typestate builder.
//!
//! Adapted from the teacher's `CrawlConfigBuilder`: a marker-typed builder
//! that only lets `build()` be called once the one genuinely required
//! field — `cache_dir`, where the LRU cache persists — has been set.
//! Every other field carries a sensible default, same as the original's
//! keyword-argument constructor.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CoordinatorError;
use crate::result::TaskResult;
use crate::task::Task;

/// Invoked exactly once per relevant event. Runs on the worker thread
/// that produced it — must not block on coordinator locks.
pub type SuccessHook = Arc<dyn Fn(&TaskResult) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&Task, &str) + Send + Sync>;
pub type CompleteHook = Arc<dyn Fn() + Send + Sync>;

pub struct CoordinatorConfig {
    pub cache_dir: PathBuf,
    pub max_workers: usize,
    pub delay_between_requests: Duration,
    pub max_retries: u32,
    pub default_timeout: Duration,
    pub respect_robots_txt: bool,
    pub enable_cache: bool,
    pub cache_size: usize,
    pub max_queue_size: usize,
    pub show_progress: bool,
    pub circuit_breaker_threshold: u32,
    pub on_success: Option<SuccessHook>,
    pub on_error: Option<ErrorHook>,
    pub on_complete: Option<CompleteHook>,
}

pub struct Unset;
pub struct WithCacheDir;

pub struct CoordinatorConfigBuilder<State = Unset> {
    cache_dir: Option<PathBuf>,
    max_workers: usize,
    delay_between_requests: Duration,
    max_retries: u32,
    default_timeout: Duration,
    respect_robots_txt: bool,
    enable_cache: bool,
    cache_size: usize,
    max_queue_size: usize,
    show_progress: bool,
    circuit_breaker_threshold: u32,
    on_success: Option<SuccessHook>,
    on_error: Option<ErrorHook>,
    on_complete: Option<CompleteHook>,
    _phantom: PhantomData<State>,
}

impl Default for CoordinatorConfigBuilder<Unset> {
    fn default() -> Self {
        Self {
            cache_dir: None,
            max_workers: 5,
            delay_between_requests: Duration::from_millis(0),
            max_retries: 3,
            default_timeout: Duration::from_secs(15),
            respect_robots_txt: true,
            enable_cache: true,
            cache_size: 1_000,
            max_queue_size: 10_000,
            show_progress: false,
            circuit_breaker_threshold: crate::circuit_breaker::DEFAULT_THRESHOLD,
            on_success: None,
            on_error: None,
            on_complete: None,
            _phantom: PhantomData,
        }
    }
}

impl CoordinatorConfig {
    #[must_use]
    pub fn builder() -> CoordinatorConfigBuilder<Unset> {
        CoordinatorConfigBuilder::default()
    }
}

impl CoordinatorConfigBuilder<Unset> {
    #[must_use]
    pub fn cache_dir(self, dir: impl Into<PathBuf>) -> CoordinatorConfigBuilder<WithCacheDir> {
        CoordinatorConfigBuilder {
            cache_dir: Some(dir.into()),
            max_workers: self.max_workers,
            delay_between_requests: self.delay_between_requests,
            max_retries: self.max_retries,
            default_timeout: self.default_timeout,
            respect_robots_txt: self.respect_robots_txt,
            enable_cache: self.enable_cache,
            cache_size: self.cache_size,
            max_queue_size: self.max_queue_size,
            show_progress: self.show_progress,
            circuit_breaker_threshold: self.circuit_breaker_threshold,
            on_success: self.on_success,
            on_error: self.on_error,
            on_complete: self.on_complete,
            _phantom: PhantomData,
        }
    }
}

macro_rules! shared_setters {
    () => {
        #[must_use]
        pub fn max_workers(mut self, n: usize) -> Self {
            self.max_workers = n;
            self
        }

        #[must_use]
        pub fn delay_between_requests(mut self, d: Duration) -> Self {
            self.delay_between_requests = d;
            self
        }

        #[must_use]
        pub fn max_retries(mut self, n: u32) -> Self {
            self.max_retries = n;
            self
        }

        #[must_use]
        pub fn default_timeout(mut self, d: Duration) -> Self {
            self.default_timeout = d;
            self
        }

        #[must_use]
        pub fn respect_robots_txt(mut self, v: bool) -> Self {
            self.respect_robots_txt = v;
            self
        }

        #[must_use]
        pub fn enable_cache(mut self, v: bool) -> Self {
            self.enable_cache = v;
            self
        }

        #[must_use]
        pub fn cache_size(mut self, n: usize) -> Self {
            self.cache_size = n;
            self
        }

        #[must_use]
        pub fn max_queue_size(mut self, n: usize) -> Self {
            self.max_queue_size = n;
            self
        }

        #[must_use]
        pub fn show_progress(mut self, v: bool) -> Self {
            self.show_progress = v;
            self
        }

        #[must_use]
        pub fn circuit_breaker_threshold(mut self, n: u32) -> Self {
            self.circuit_breaker_threshold = n;
            self
        }

        #[must_use]
        pub fn on_success(mut self, hook: SuccessHook) -> Self {
            self.on_success = Some(hook);
            self
        }

        #[must_use]
        pub fn on_error(mut self, hook: ErrorHook) -> Self {
            self.on_error = Some(hook);
            self
        }

        #[must_use]
        pub fn on_complete(mut self, hook: CompleteHook) -> Self {
            self.on_complete = Some(hook);
            self
        }
    };
}

impl CoordinatorConfigBuilder<Unset> {
    shared_setters!();
}

impl CoordinatorConfigBuilder<WithCacheDir> {
    shared_setters!();

    pub fn build(self) -> Result<CoordinatorConfig, CoordinatorError> {
        if self.max_workers == 0 {
            return Err(CoordinatorError::InvalidPolicy(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(CoordinatorError::InvalidPolicy(
                "circuit_breaker_threshold must be at least 1".to_string(),
            ));
        }

        Ok(CoordinatorConfig {
            cache_dir: self
                .cache_dir
                .expect("WithCacheDir state guarantees cache_dir is set"),
            max_workers: self.max_workers,
            delay_between_requests: self.delay_between_requests,
            max_retries: self.max_retries,
            default_timeout: self.default_timeout,
            respect_robots_txt: self.respect_robots_txt,
            enable_cache: self.enable_cache,
            cache_size: self.cache_size,
            max_queue_size: self.max_queue_size,
            show_progress: self.show_progress,
            circuit_breaker_threshold: self.circuit_breaker_threshold,
            on_success: self.on_success,
            on_error: self.on_error,
            on_complete: self.on_complete,
        })
    }
}
