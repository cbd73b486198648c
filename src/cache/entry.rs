//! The persisted unit of the cache

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached payload together with its freshness window
///
/// Entries are never edited in place. A refresh builds a new entry and the
/// store swaps it in whole, so `value` and `expires_at` always come from the
/// same production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unique identifier (e.g., "weather_port_alberni_live")
    pub key: String,
    /// The cached payload
    pub value: Value,
    /// Instant after which the entry is stale
    pub expires_at: DateTime<Utc>,
    /// When the payload was produced
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Builds an entry produced at `now` that stays fresh for `ttl`
    ///
    /// An expiry past the last representable instant saturates to it.
    pub fn new(key: impl Into<String>, value: Value, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            expires_at: now
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            created_at: now,
        }
    }

    /// Whether the entry may still be served at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
