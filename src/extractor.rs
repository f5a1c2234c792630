//! C6 — extractor contract.
//!
//! The extractor itself (browser automation, CSS selectors, pagination)
//! is out of scope; this module only defines the minimal contract C7
//! depends on and a registry keyed by `(TaskType, DynamicSubtype)`,
//! mirroring the original's `select_extractor` dispatch — minus the
//! `real_state` subtype, which the original lists as valid but never
//! implements (see DESIGN.md Open Question (e)).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ExtractError;
use crate::task::{DynamicSubtype, Task, TaskType};

/// Performs the actual extraction for one task. Implementations own
/// whatever browser/HTTP/DOM machinery they need; the coordinator only
/// ever sees `extract`.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, task: &Task) -> Result<serde_json::Value, ExtractError>;
}

/// Dispatches a task to the extractor registered for its
/// `(task_type, subtype)` pair.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<(TaskType, DynamicSubtype), Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task_type: TaskType, subtype: DynamicSubtype, extractor: Arc<dyn Extractor>) {
        self.extractors.insert((task_type, subtype), extractor);
    }

    #[must_use]
    pub fn get(&self, task_type: TaskType, subtype: DynamicSubtype) -> Option<Arc<dyn Extractor>> {
        self.extractors.get(&(task_type, subtype)).cloned()
    }
}
