//! Result data model, result store, and exporters (C10).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::task::{DynamicSubtype, Task, TaskType};

/// Per-task execution metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub duration_secs: f64,
    pub attempts: u32,
}

/// Outcome of executing one task. Never both success and failure: either
/// `data` is present and `error` absent, or vice versa.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskResult {
    Success {
        url: String,
        task_type: TaskType,
        subtype: DynamicSubtype,
        priority: u32,
        data: serde_json::Value,
        from_cache: bool,
        metrics: TaskMetrics,
    },
    Failure {
        url: String,
        error: String,
        error_kind: ErrorKind,
        task_type: TaskType,
        subtype: DynamicSubtype,
        priority: u32,
        metrics: TaskMetrics,
        circuit_breaker: bool,
    },
}

// `ErrorKind` needs (de)serialization for export/round-trip; derive it by
// hand since the enum lives in error.rs without a serde dependency on it.
impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "Validation" => Self::Validation,
            "QueueFull" => Self::QueueFull,
            "RobotsBlocked" => Self::RobotsBlocked,
            "CircuitOpen" => Self::CircuitOpen,
            "Timeout" => Self::Timeout,
            "Network" => Self::Network,
            "ParseOrValue" => Self::ParseOrValue,
            _ => Self::Unknown,
        })
    }
}

impl TaskResult {
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Success { url, .. } | Self::Failure { url, .. } => url,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn metrics(&self) -> TaskMetrics {
        match self {
            Self::Success { metrics, .. } | Self::Failure { metrics, .. } => *metrics,
        }
    }

    #[must_use]
    pub fn circuit_breaker_blocked(&self) -> bool {
        matches!(self, Self::Failure { circuit_breaker: true, .. })
    }

    /// Reconstruct a retryable task from a failure, if it is not
    /// circuit-blocked. Caller supplies the coordinator default timeout
    /// (resetting the timeout rather than reusing the prior measured
    /// duration — see DESIGN.md Open Question (d)).
    #[must_use]
    pub fn to_retry_task(&self, default_timeout: std::time::Duration) -> Option<Task> {
        match self {
            Self::Failure {
                url,
                task_type,
                subtype,
                priority,
                circuit_breaker,
                ..
            } if !circuit_breaker => Some(Task {
                url: url.clone(),
                task_type: *task_type,
                subtype: *subtype,
                priority: *priority,
                timeout: Some(default_timeout),
                params: crate::task::TaskParams::default(),
            }),
            _ => None,
        }
    }
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    /// Same columns as Csv, with localized (Spanish) headers — see
    /// SPEC_FULL.md §5 C10 for why this stands in for a spreadsheet format.
    Tabular,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv | Self::Tabular => "csv",
        }
    }
}

#[derive(Debug, Serialize)]
struct FlatRow<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    task_type: String,
    subtype: String,
    success: bool,
    error: Option<&'a str>,
    error_kind: Option<&'a str>,
    duration: f64,
    attempts: u32,
    from_cache: bool,
    circuit_breaker: bool,
}

fn to_row(r: &TaskResult) -> FlatRow<'_> {
    match r {
        TaskResult::Success {
            url,
            task_type,
            subtype,
            from_cache,
            metrics,
            ..
        } => FlatRow {
            url,
            task_type: task_type.to_string(),
            subtype: subtype.to_string(),
            success: true,
            error: None,
            error_kind: None,
            duration: metrics.duration_secs,
            attempts: metrics.attempts,
            from_cache: *from_cache,
            circuit_breaker: false,
        },
        TaskResult::Failure {
            url,
            error,
            error_kind,
            task_type,
            subtype,
            metrics,
            circuit_breaker,
            ..
        } => FlatRow {
            url,
            task_type: task_type.to_string(),
            subtype: subtype.to_string(),
            success: false,
            error: Some(error),
            error_kind: Some(error_kind.as_str()),
            duration: metrics.duration_secs,
            attempts: metrics.attempts,
            from_cache: false,
            circuit_breaker: *circuit_breaker,
        },
    }
}

/// Holds the accumulated result list (insertion/completion order, not
/// priority order) and exposes the exporters.
#[derive(Default)]
pub struct ResultStore {
    results: Vec<TaskResult>,
}

impl ResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: TaskResult) {
        self.results.push(result);
    }

    #[must_use]
    pub fn all(&self) -> &[TaskResult] {
        &self.results
    }

    #[must_use]
    pub fn successes(&self) -> Vec<&TaskResult> {
        self.results.iter().filter(|r| r.is_success()).collect()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.results.iter().filter(|r| !r.is_success()).collect()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Export the result list. Returns the path written to.
    ///
    /// Default path: `outputs/exports/scraping_results_<UTCtimestamp>.<ext>`.
    pub fn export(
        &self,
        format: ExportFormat,
        path: Option<PathBuf>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<PathBuf> {
        let path = path.unwrap_or_else(|| default_export_path(format, now));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match format {
            ExportFormat::Json => {
                let json = serde_json::to_string_pretty(&self.results)?;
                std::fs::write(&path, json)?;
            }
            ExportFormat::Csv => {
                write_csv(&path, &self.results, &["url", "type", "subtype", "success", "error", "error_kind", "duration", "attempts", "from_cache", "circuit_breaker"])?;
            }
            ExportFormat::Tabular => {
                write_csv(&path, &self.results, &["URL", "Tipo", "Subtipo", "Éxito", "Error", "Tipo Error", "Duración (s)", "Intentos", "Desde Caché", "Circuit Breaker"])?;
            }
        }

        Ok(path)
    }
}

fn write_csv(path: &Path, results: &[TaskResult], headers: &[&str]) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record(headers)?;
    for r in results {
        let row = to_row(r);
        writer.write_record([
            row.url.to_string(),
            row.task_type,
            row.subtype,
            row.success.to_string(),
            row.error.unwrap_or_default().to_string(),
            row.error_kind.unwrap_or_default().to_string(),
            row.duration.to_string(),
            row.attempts.to_string(),
            row.from_cache.to_string(),
            row.circuit_breaker.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn default_export_path(format: ExportFormat, now: chrono::DateTime<chrono::Utc>) -> PathBuf {
    let timestamp = now.format("%Y%m%d_%H%M%S");
    PathBuf::from("outputs/exports").join(format!(
        "scraping_results_{timestamp}.{}",
        format.extension()
    ))
}
