//! In-memory slots for decoded JSON responses.

use dashmap::DashMap;
use serde_json::Value;

use crate::cache::key::CacheKey;

/// Last successful JSON response per key.
///
/// Entries never expire and the table is unbounded.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slots: DashMap<CacheKey, Value>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot for `key`.
    pub fn put(&self, key: CacheKey, value: Value) {
        self.slots.insert(key, value);
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.slots.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
