//! Read/write mirrors of server data kept in the session store.
//!
//! No eviction and no consistency protocol: the server is the source of truth
//! and every successful fetch simply overwrites the mirror.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::assessment::AssessmentKind;
use crate::storage::{SessionStore, StoreError};

pub const CLASSES: &str = "classes";
pub const MATERIALS: &str = "materials";

#[derive(Clone)]
pub struct ListCache {
    store: Arc<dyn SessionStore>,
}

impl ListCache {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    fn key(name: &str) -> String {
        format!("cache:{}", name)
    }

    pub fn write<T: Serialize>(&self, name: &str, items: &[T]) -> Result<(), StoreError> {
        self.store.set(&Self::key(name), &serde_json::to_string(items)?)
    }

    /// Last mirrored list, or `None` when nothing (readable) was cached.
    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Option<Vec<T>> {
        let raw = self.store.get(&Self::key(name))?;
        match serde_json::from_str(&raw) {
            Ok(items) => Some(items),
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", name, e);
                None
            }
        }
    }

    pub fn invalidate(&self, name: &str) -> Result<(), StoreError> {
        self.store.remove(&Self::key(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedScore {
    pub attempt_id: u64,
    pub score: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// Last-known scores and locally tracked completion flags per assessment.
#[derive(Clone)]
pub struct ProgressCache {
    store: Arc<dyn SessionStore>,
}

impl ProgressCache {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn record_score(
        &self,
        kind: AssessmentKind,
        attempt_id: u64,
        score: Option<f64>,
    ) -> Result<(), StoreError> {
        let entry = CachedScore {
            attempt_id,
            score,
            recorded_at: Utc::now(),
        };
        self.store
            .set(&format!("last_score:{}", kind.as_str()), &serde_json::to_string(&entry)?)
    }

    pub fn last_score(&self, kind: AssessmentKind) -> Option<CachedScore> {
        let raw = self.store.get(&format!("last_score:{}", kind.as_str()))?;
        serde_json::from_str(&raw).ok()
    }

    pub fn mark_completed(&self, kind: AssessmentKind, assessment_id: u64) -> Result<(), StoreError> {
        self.store
            .set(&format!("completed:{}:{}", kind.as_str(), assessment_id), "1")
    }

    pub fn is_completed(&self, kind: AssessmentKind, assessment_id: u64) -> bool {
        self.store
            .get(&format!("completed:{}:{}", kind.as_str(), assessment_id))
            .is_some()
    }
}
