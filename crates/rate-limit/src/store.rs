//! Backing stores for rate-limit records

use fleetline_core::RateLimitRecord;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Storage for per-caller window records.
///
/// Implementations must be safe to share between request handlers. A
/// shared cache client can implement this to coordinate several instances.
pub trait RateLimitStore: Send + Sync {
    /// Current record for `identifier`
    fn get(&self, identifier: &str) -> Option<RateLimitRecord>;

    /// Insert or replace the record keyed by `record.identifier`
    fn put(&self, record: RateLimitRecord);

    /// Number of tracked identifiers
    fn len(&self) -> usize;

    /// Whether the store holds no records
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every record whose window ended before `now_ms`; returns how many were removed
    fn evict_expired(&self, now_ms: u64) -> usize;
}

/// Process-local store backed by a locked map
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<RwLock<HashMap<String, RateLimitRecord>>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryStore {
    fn get(&self, identifier: &str) -> Option<RateLimitRecord> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(identifier)
            .cloned()
    }

    fn put(&self, record: RateLimitRecord) {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(record.identifier.clone(), record);
    }

    fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn evict_expired(&self, now_ms: u64) -> usize {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now_ms));
        before - records.len()
    }
}
