//! Task value objects.
//!
//! A `Task` is immutable once constructed — the coordinator never mutates
//! a queued task, only reads it. `fingerprint()` is the cache key used by
//! C2 (a stable, non-cryptographic hash over `(url, type, subtype)`,
//! mirroring the original's `md5(f"{url}_{type}_{subtype}")`).

use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level task type. `Dynamic` is the only registered type today; the
/// enum exists as the extension point spec.md calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    Dynamic,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// Registered subtypes of `TaskType::Dynamic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamicSubtype {
    ECommerce,
}

impl DynamicSubtype {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "e-commerce" => Some(Self::ECommerce),
            _ => None,
        }
    }
}

impl std::fmt::Display for DynamicSubtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ECommerce => f.write_str("e-commerce"),
        }
    }
}

/// Subtype-specific parameters. Unused fields for a given subtype are
/// simply `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskParams {
    pub tienda: Option<String>,
    pub num_productos: Option<u32>,
    pub max_paginas: Option<u32>,
}

/// A unit of extraction work. Value object: queued tasks are never
/// mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub url: String,
    pub task_type: TaskType,
    pub subtype: DynamicSubtype,
    pub priority: u32,
    pub timeout: Option<Duration>,
    pub params: TaskParams,
}

impl Task {
    /// Stable fingerprint over `(url, type, subtype)`, used as the cache
    /// key by C2. Not cryptographic — a stable key, nothing more.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.url.hash(&mut hasher);
        self.task_type.hash(&mut hasher);
        self.subtype.hash(&mut hasher);
        hasher.finish()
    }
}
