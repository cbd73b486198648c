//! Storage backends for cache entries
//!
//! A store only has to do two things: look an entry up by key, and replace the
//! entry for a key in one step. Expiry decisions belong to the cache, not the
//! store, so stale entries are returned as-is.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use super::CacheEntry;

/// Errors raised by a cache store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem read/write failed
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded
    #[error("Store record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store cannot be reached at all
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Key/entry persistence used by [`TemporalCache`](super::TemporalCache)
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the entry for `key`, fresh or not, or `None` if there is none
    async fn lookup(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Inserts `entry`, or overwrites whatever is stored under `entry.key`
    ///
    /// The overwrite must be atomic with respect to concurrent `lookup` calls.
    async fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError>;
}

/// Process-local store backed by a map
///
/// Readers share the lock; an upsert swaps the whole entry under the write
/// lock, so a concurrent lookup sees either the old entry or the new one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys that have ever been populated
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no key has been populated yet
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn lookup(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError> {
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn entry(key: &str, value: serde_json::Value) -> CacheEntry {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        CacheEntry::new(key, value, now, Duration::minutes(15))
    }

    #[tokio::test]
    async fn test_lookup_missing_key_returns_none() {
        let store = MemoryStore::new();
        assert!(store.lookup("nope").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_upsert_then_lookup() {
        let store = MemoryStore::new();
        let written = entry("weather_port_alberni_live", json!({"temp": 12}));

        store.upsert(written.clone()).await.unwrap();

        let read = store.lookup("weather_port_alberni_live").await.unwrap();
        assert_eq!(read, Some(written));
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_entry() {
        let store = MemoryStore::new();
        store.upsert(entry("k", json!(1))).await.unwrap();
        store.upsert(entry("k", json!(2))).await.unwrap();

        let read = store.lookup("k").await.unwrap().unwrap();
        assert_eq!(read.value, json!(2));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryStore::new();
        store.upsert(entry("a", json!("a"))).await.unwrap();
        store.upsert(entry("b", json!("b"))).await.unwrap();
        store.upsert(entry("a", json!("a2"))).await.unwrap();

        assert_eq!(store.lookup("b").await.unwrap().unwrap().value, json!("b"));
        assert_eq!(store.len().await, 2);
    }
}
