//! Error taxonomy for the coordinator.
//!
//! `ErrorKind` drives retry decisions inside the executor (C7); it is a
//! closed, matchable enum rather than an open error type so the retry
//! policy is a pure function of the kind (never of a catch-block or a
//! string pattern match).
//!
//! `CoordinatorError` is reserved for programmer-facing failures:
//! malformed task batches and queue capacity. Per-task failures never
//! produce a `CoordinatorError` — they become `Failure` results (see
//! `result.rs`).

use thiserror::Error;

/// Classification of a single extractor failure.
///
/// Determines whether the executor retries an attempt and, if so, with
/// what backoff multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed task; never produced mid-execution, only at validation.
    Validation,
    /// Queue was at capacity when a push was attempted.
    QueueFull,
    /// robots.txt policy disallows the fetch.
    RobotsBlocked,
    /// Circuit breaker is open for this URL.
    CircuitOpen,
    /// Deadline exceeded for one extractor invocation.
    Timeout,
    /// Transport-level I/O error.
    Network,
    /// Extractor raised a value/key/attribute-class error.
    ParseOrValue,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Whether an attempt that failed with this kind should be retried.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Self::ParseOrValue | Self::Validation)
    }

    /// Human-readable label used in `Failure::error_kind` exports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "Validation",
            Self::QueueFull => "QueueFull",
            Self::RobotsBlocked => "RobotsBlocked",
            Self::CircuitOpen => "CircuitOpen",
            Self::Timeout => "Timeout",
            Self::Network => "Network",
            Self::ParseOrValue => "ParseOrValue",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by an `Extractor`, classified by the executor into an
/// `ErrorKind` for retry purposes.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("network error: {0}")]
    Network(String),
    #[error("value/parse error: {0}")]
    ParseOrValue(String),
    #[error("{0}")]
    Other(String),
}

impl ExtractError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::ParseOrValue(_) => ErrorKind::ParseOrValue,
            Self::Other(_) => ErrorKind::Unknown,
        }
    }
}

/// Programmer-facing error surfaced by construction-time or queue-level
/// operations. Never produced for a per-task failure.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("task validation failed: {0}")]
    Validation(String),

    #[error("queue full: attempted to add {attempted} task(s), {available} slot(s) available")]
    QueueFull { attempted: usize, available: usize },

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
}
