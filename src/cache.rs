//! Result cache: content-hash keyed reuse of previously computed violations.
//!
//! An entry stores the *least-filtered* violation set together with metrics
//! and counts. It is valid only while its content hash matches the file's
//! current content; configuration changes never invalidate entries — the
//! current run's filters are re-applied by replaying the raw set through the
//! ledger. Backends must tolerate concurrent `get`/`set` from multiple
//! workers; last-writer-wins per path is acceptable.

use std::collections::HashMap;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::file::MetricMap;
use crate::fs_utils::{
    DEFAULT_LOCK_TIMEOUT_MS, SaveOutcome, atomic_write_with_lock, try_lock_shared_with_timeout,
    unlock_file,
};
use crate::violations::Violation;
use crate::{Result, TokenSniffError};

const CACHE_VERSION: u32 = 1;

/// Hash of file content, the sole invalidation key for cache entries.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cached processing results for a single file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub hash: String,
    /// Raw (least-filtered) error set; re-filtered on adoption.
    pub errors: Vec<Violation>,
    pub warnings: Vec<Violation>,
    pub metrics: MetricMap,
    pub error_count: u32,
    pub warning_count: u32,
    pub fixable_count: u32,
    pub token_count: u32,
}

impl CacheEntry {
    /// Whether this entry may be used for content hashing to `hash`.
    #[must_use]
    pub fn is_valid_for(&self, hash: &str) -> bool {
        self.hash == hash
    }
}

/// Storage backend contract: keyed by absolute path, valid across runs,
/// invalidated by content-hash mismatch only.
pub trait ResultCache: Send + Sync {
    fn get(&self, path: &Path) -> Option<CacheEntry>;
    fn set(&self, path: &Path, entry: CacheEntry);
}

/// Process-local backend, for single runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache map poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, path: &Path) -> Option<CacheEntry> {
        self.entries
            .lock()
            .expect("cache map poisoned")
            .get(path)
            .cloned()
    }

    fn set(&self, path: &Path, entry: CacheEntry) {
        self.entries
            .lock()
            .expect("cache map poisoned")
            .insert(path.to_path_buf(), entry);
    }
}

/// On-disk persisted form of a [`JsonFileCache`].
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    files: HashMap<String, CacheEntry>,
}

/// JSON file backed cache, persisted across runs.
///
/// Loads take a shared lock; saves use the atomic temp-file + rename pattern
/// under an exclusive lock, so concurrent workers cannot corrupt the file
/// (a save that loses the race is simply skipped — last writer wins).
#[derive(Debug)]
pub struct JsonFileCache {
    file_path: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl JsonFileCache {
    /// Open a cache file, starting empty when it does not exist or carries a
    /// different format version.
    ///
    /// # Errors
    /// Returns an error when an existing file cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = path.into();
        if !file_path.exists() {
            return Ok(Self {
                file_path,
                entries: Mutex::new(HashMap::new()),
            });
        }

        let file = fs::File::open(&file_path).map_err(|source| TokenSniffError::FileRead {
            path: file_path.clone(),
            source,
        })?;
        // Shared lock for reading; multiple readers are fine. A timeout
        // degrades to reading whatever is there.
        let locked = try_lock_shared_with_timeout(&file, DEFAULT_LOCK_TIMEOUT_MS).is_ok();
        let parsed: CacheFile = serde_json::from_reader(BufReader::new(&file))?;
        if locked {
            unlock_file(&file);
        }

        let entries = if parsed.version == CACHE_VERSION {
            parsed.files
        } else {
            tracing::debug!(
                version = parsed.version,
                "cache file version mismatch, starting empty"
            );
            HashMap::new()
        };
        Ok(Self {
            file_path,
            entries: Mutex::new(entries),
        })
    }

    /// Persist the current entries.
    ///
    /// # Errors
    /// Returns an error when serialization or the write fails (a lock
    /// timeout yields `Ok(SaveOutcome::Skipped)` instead).
    pub fn save(&self) -> Result<SaveOutcome> {
        let files = self.entries.lock().expect("cache map poisoned").clone();
        let json = serde_json::to_string(&CacheFile {
            version: CACHE_VERSION,
            files,
        })?;
        atomic_write_with_lock(&self.file_path, json.as_bytes()).map_err(TokenSniffError::Io)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache map poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for JsonFileCache {
    fn get(&self, path: &Path) -> Option<CacheEntry> {
        self.entries
            .lock()
            .expect("cache map poisoned")
            .get(&path.to_string_lossy().into_owned())
            .cloned()
    }

    fn set(&self, path: &Path, entry: CacheEntry) {
        self.entries
            .lock()
            .expect("cache map poisoned")
            .insert(path.to_string_lossy().into_owned(), entry);
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
