//! Counter store trait for abstracting volatile and durable limiter state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, ThrottleError};

/// Trait for counter store implementations.
///
/// A store holds one JSON record per limiter key. Limiters serialize their
/// own read-modify-write cycles, so implementations only need per-call
/// consistency; concurrent writers from other processes resolve as
/// last-write-wins.
pub trait CounterStore: Send + Sync + std::fmt::Debug {
    /// Read the record stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the record stored under `key`.
    fn put(&self, key: &str, record: Value) -> Result<()>;

    /// Delete the record stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Load a typed record, falling back to its default on any failure.
///
/// A corrupt or unreadable counter must never lock the user out, so read
/// and parse errors are logged and replaced with the empty state.
pub(crate) fn load_or_default<T>(store: &dyn CounterStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let value = match store.get(key) {
        Ok(Some(value)) => value,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to read limiter record, using empty state");
            return T::default();
        }
    };

    match serde_json::from_value(value) {
        Ok(record) => record,
        Err(e) => {
            warn!(key = %key, error = %e, "Malformed limiter record, using empty state");
            T::default()
        }
    }
}

/// Persist a typed record. Write failures are logged and swallowed.
pub(crate) fn save<T: Serialize>(store: &dyn CounterStore, key: &str, record: &T) {
    let result = serde_json::to_value(record)
        .map_err(ThrottleError::from)
        .and_then(|value| store.put(key, value));

    if let Err(e) = result {
        warn!(key = %key, error = %e, "Failed to persist limiter record");
    }
}

/// Remove a record. Failures are logged and swallowed.
pub(crate) fn clear(store: &dyn CounterStore, key: &str) {
    if let Err(e) = store.remove(key) {
        warn!(key = %key, error = %e, "Failed to clear limiter record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        count: u32,
    }

    #[derive(Debug)]
    struct BrokenStore;

    impl CounterStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<Value>> {
            Err(ThrottleError::Storage("disk on fire".to_string()))
        }

        fn put(&self, _key: &str, _record: Value) -> Result<()> {
            Err(ThrottleError::Storage("disk on fire".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(ThrottleError::Storage("disk on fire".to_string()))
        }
    }

    #[test]
    fn test_load_missing_record_is_default() {
        let store = MemoryStore::new();
        let record: Sample = load_or_default(&store, "absent");
        assert_eq!(record, Sample::default());
    }

    #[test]
    fn test_load_malformed_record_fails_open() {
        let store = MemoryStore::new();
        store.put("sample", json!({"count": "not a number"})).unwrap();

        let record: Sample = load_or_default(&store, "sample");
        assert_eq!(record.count, 0);
    }

    #[test]
    fn test_broken_store_fails_open() {
        let record: Sample = load_or_default(&BrokenStore, "sample");
        assert_eq!(record.count, 0);

        // Neither of these may panic or propagate.
        save(&BrokenStore, "sample", &Sample { count: 3 });
        clear(&BrokenStore, "sample");
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        save(&store, "sample", &Sample { count: 7 });

        let record: Sample = load_or_default(&store, "sample");
        assert_eq!(record.count, 7);
    }
}
