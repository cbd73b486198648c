//! Get-or-produce cache with graceful degradation
//!
//! Every data feed goes through [`TemporalCache::get_or_produce`]: serve the
//! cached value while it is fresh, otherwise produce a new one and persist it,
//! and if production fails hand back a degraded fallback without caching it.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{CacheEntry, CacheStore, Clock, SystemClock};

/// Errors returned by [`TemporalCache::get_or_produce`]
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache keys must be non-empty
    #[error("Cache key must not be empty")]
    InvalidKey,

    /// TTL must be positive and representable as a timestamp offset
    #[error("Invalid TTL for '{key}': {ttl:?}")]
    InvalidTtl { key: String, ttl: Duration },

    /// The producer failed and so did the fallback; no usable data exists
    #[error("No data for '{key}': producer failed ({producer}); fallback failed ({fallback})")]
    ProductionAndFallbackFailed {
        key: String,
        producer: String,
        fallback: String,
    },
}

/// Where a served value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A fresh cached entry
    Cache,
    /// The producer, just now; the value has been stored
    Fresh,
    /// The fallback, after the producer failed; nothing was stored
    Fallback,
}

/// A value handed back by the cache, tagged with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub origin: Origin,
}

impl<T> Served<T> {
    /// True only when the value came from a fresh cache entry
    pub fn was_cached(&self) -> bool {
        self.origin == Origin::Cache
    }
}

/// Per-key production locks for single-flight mode
type FlightLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Time-windowed cache-or-refresh over a [`CacheStore`]
///
/// Cheap to clone; clones share the store, clock and flight locks. Construct
/// one per process and hand it to whatever needs cached data.
#[derive(Clone)]
pub struct TemporalCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    flights: Option<Arc<FlightLocks>>,
}

impl TemporalCache {
    /// Creates a cache over `store` using wall-clock time
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            flights: None,
        }
    }

    /// Replaces the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Serializes production per key
    ///
    /// Callers racing on the same missing or stale key queue behind one
    /// production; the rest re-check the store once it finishes and are
    /// served the value it wrote. Without this, every racer produces and the
    /// last write wins.
    ///
    /// Locks are kept for every key ever produced; dashboard keys are a small fixed set.
    pub fn single_flight(mut self) -> Self {
        self.flights = Some(Arc::new(Mutex::new(HashMap::new())));
        self
    }

    /// Serves `key` from cache, or produces, stores and serves a new value
    ///
    /// # Behavior
    /// - A fresh entry is returned with [`Origin::Cache`]; the producer is not called
    /// - Otherwise `producer` runs once. On success the value is stored with
    ///   `expires_at = now + ttl` and returned with [`Origin::Fresh`]
    /// - If `producer` fails, `fallback` supplies the value, returned with
    ///   [`Origin::Fallback`] and never stored, so the next call retries
    /// - Store failures are logged and never surface: a failed lookup counts
    ///   as a miss, a failed write still returns the fresh value
    ///
    /// # Errors
    /// - [`CacheError::InvalidKey`] / [`CacheError::InvalidTtl`] for bad arguments
    /// - [`CacheError::ProductionAndFallbackFailed`] when both closures fail
    pub async fn get_or_produce<T, P, Fut, E, F, FE>(
        &self,
        key: &str,
        ttl: Duration,
        producer: P,
        fallback: F,
    ) -> Result<Served<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        P: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        F: FnOnce() -> Result<T, FE>,
        FE: Display,
    {
        if key.is_empty() {
            return Err(CacheError::InvalidKey);
        }
        let ttl_delta = match chrono::Duration::from_std(ttl) {
            Ok(delta)
                if delta > chrono::Duration::zero()
                    && self.clock.now().checked_add_signed(delta).is_some() =>
            {
                delta
            }
            _ => {
                return Err(CacheError::InvalidTtl {
                    key: key.to_string(),
                    ttl,
                })
            }
        };

        if let Some(value) = self.read_fresh(key).await {
            return Ok(Served {
                value,
                origin: Origin::Cache,
            });
        }

        let _flight = match &self.flights {
            Some(flights) => {
                let guard = flight_lock(flights, key).lock_owned().await;
                // Someone else may have produced while we waited
                if let Some(value) = self.read_fresh(key).await {
                    return Ok(Served {
                        value,
                        origin: Origin::Cache,
                    });
                }
                Some(guard)
            }
            None => None,
        };

        match producer().await {
            Ok(value) => {
                self.persist(key, &value, ttl_delta).await;
                Ok(Served {
                    value,
                    origin: Origin::Fresh,
                })
            }
            Err(producer_err) => {
                warn!(key = %key, error = %producer_err, "Producer failed, serving fallback");
                match fallback() {
                    Ok(value) => Ok(Served {
                        value,
                        origin: Origin::Fallback,
                    }),
                    Err(fallback_err) => {
                        error!(key = %key, error = %fallback_err, "Fallback failed, no data available");
                        Err(CacheError::ProductionAndFallbackFailed {
                            key: key.to_string(),
                            producer: producer_err.to_string(),
                            fallback: fallback_err.to_string(),
                        })
                    }
                }
            }
        }
    }

    /// Returns the cached value for `key` if it is fresh and decodes as `T`
    async fn read_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = match self.store.lookup(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
                return None;
            }
        };

        let now = self.clock.now();
        if !entry.is_fresh(now) {
            debug!(key = %key, expires_at = %entry.expires_at, "Cache entry stale");
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => {
                debug!(key = %key, expires_at = %entry.expires_at, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value has unexpected shape, treating as miss");
                None
            }
        }
    }

    /// Stores a freshly produced value; failures are logged, not returned
    async fn persist<T: Serialize>(&self, key: &str, value: &T, ttl: chrono::Duration) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, error = %e, "Produced value is not serializable, not caching");
                return;
            }
        };

        let entry = CacheEntry::new(key, json, self.clock.now(), ttl);
        let expires_at = entry.expires_at;
        match self.store.upsert(entry).await {
            Ok(()) => info!(key = %key, expires_at = %expires_at, "Cache refreshed"),
            Err(e) => warn!(key = %key, error = %e, "Cache write failed, serving uncached value"),
        }
    }
}

/// Returns the production lock for `key`, creating it on first use
fn flight_lock(flights: &FlightLocks, key: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = flights.lock().unwrap_or_else(|e| e.into_inner());
    locks
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
        .clone()
}
