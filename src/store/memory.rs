//! In-memory counter store.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::ratelimit::CounterStore;

/// Volatile counter store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CounterStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &str, record: Value) -> Result<()> {
        self.records.insert(key.to_string(), record);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }
}
