//! File-backed cache store
//!
//! Persists each cache entry as a JSON file named after its key, inside an
//! XDG-compliant cache directory, so cached feeds survive between runs.

use async_trait::async_trait;
use directories::ProjectDirs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

use super::{CacheEntry, CacheStore, StoreError};

/// Stores cache entries as `<key>.json` files in a directory
///
/// Writes go to a uniquely named temp file first and are then renamed over the
/// target, so a reader always sees a complete record: either the previous one
/// or the new one.
#[derive(Debug)]
pub struct FileStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    /// Disambiguates temp files of concurrent writers
    write_seq: AtomicU64,
}

impl FileStore {
    /// Creates a FileStore in the XDG cache directory
    ///
    /// Uses `~/.cache/padaily/` on Linux, or the platform equivalent.
    /// Returns `None` if no home directory can be determined.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "padaily")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates a FileStore rooted at a custom directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            write_seq: AtomicU64::new(0),
        }
    }

    /// Directory this store writes into
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the cache file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", file_stem(key)))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        self.cache_dir
            .join(format!(".{}.{}.{}.tmp", file_stem(key), std::process::id(), seq))
    }
}

/// Maps a cache key to a safe file name
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl CacheStore for FileStore {
    async fn lookup(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let content = match fs::read_to_string(self.cache_path(key)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry = serde_json::from_str(&content)?;

        // Two keys can sanitize to the same file name; never serve the other one.
        if entry.key != key {
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError> {
        fs::create_dir_all(&self.cache_dir).await?;

        let json = serde_json::to_string_pretty(&entry)?;
        let temp_path = self.temp_path(&entry.key);
        let target = self.cache_path(&entry.key);

        if let Err(e) = fs::write(&temp_path, json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &target).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }
}
