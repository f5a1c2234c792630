//! C5 — task validator.
//!
//! Validation is batch-level and exhaustive per task, but the batch itself
//! is short-circuiting: the first invalid task aborts insertion of the
//! whole batch (matching the original's `validate_tasks`, which raises on
//! the first bad entry rather than collecting all errors).

use url::Url;

use crate::error::CoordinatorError;
use crate::task::Task;

/// Validate a batch of tasks. Returns the first validation failure, if
/// any; does not partially validate — callers either get `Ok(())` (every
/// task is well-formed) or the first `Err`.
pub fn validate_tasks(tasks: &[Task]) -> Result<(), CoordinatorError> {
    for (idx, task) in tasks.iter().enumerate() {
        validate_task(idx, task)?;
    }
    Ok(())
}

fn validate_task(idx: usize, task: &Task) -> Result<(), CoordinatorError> {
    if task.url.trim().is_empty() {
        return Err(CoordinatorError::Validation(format!(
            "task {idx}: url must not be empty"
        )));
    }

    let parsed = Url::parse(&task.url).map_err(|e| {
        CoordinatorError::Validation(format!(
            "task {idx}: malformed url '{}': {e}",
            task.url
        ))
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CoordinatorError::Validation(format!(
            "task {idx}: url '{}' must use http or https",
            task.url
        )));
    }

    if parsed.host_str().is_none() {
        return Err(CoordinatorError::Validation(format!(
            "task {idx}: url '{}' has no host",
            task.url
        )));
    }

    // url::Url already rejects ports outside 0-65535 (at most 5 digits),
    // so no further port validation is needed here.

    if let Some(timeout) = task.timeout
        && timeout.is_zero()
    {
        return Err(CoordinatorError::Validation(format!(
            "task {idx}: timeout must be a positive number of seconds"
        )));
    }

    match task.subtype {
        crate::task::DynamicSubtype::ECommerce => {
            if let Some(n) = task.params.num_productos
                && n < 1
            {
                return Err(CoordinatorError::Validation(format!(
                    "task {idx}: num_productos must be >= 1"
                )));
            }
            if let Some(n) = task.params.max_paginas
                && n < 1
            {
                return Err(CoordinatorError::Validation(format!(
                    "task {idx}: max_paginas must be >= 1"
                )));
            }
        }
    }

    Ok(())
}
