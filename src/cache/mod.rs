//! Time-windowed cache-or-refresh
//!
//! This module provides [`TemporalCache`], which serves a JSON-serializable
//! value per key until its expiry, refreshes it through a caller-supplied
//! producer, and degrades to a caller-supplied fallback when the producer
//! fails. Fallback values are never cached, so the next call retries.
//!
//! Entries live in a pluggable [`CacheStore`]: [`MemoryStore`] for a single
//! process, or [`FileStore`] to persist entries to disk between runs.

mod clock;
mod entry;
mod file_store;
mod store;
mod temporal;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use file_store::FileStore;
pub use store::{CacheStore, MemoryStore, StoreError};
pub use temporal::{CacheError, Origin, Served, TemporalCache};
