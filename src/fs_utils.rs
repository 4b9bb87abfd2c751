//! File-locking and atomic-write utilities for shared state files.
//!
//! Multiple workers (or whole processes) may read and write the persisted
//! result cache concurrently. Writes go through a temp-file + rename pattern
//! under an exclusive lock; a lock that cannot be acquired within the timeout
//! skips the write rather than blocking a run.

use std::fs::{self, File, TryLockError};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Default lock timeout in milliseconds.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Polling interval for lock acquisition in milliseconds.
const LOCK_POLL_INTERVAL_MS: u64 = 50;

/// Outcome of a guarded save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Another worker held the lock past the timeout; the write was skipped
    /// (last writer wins, so a skipped write is not data loss).
    Skipped,
}

/// Error type for lock acquisition failures.
#[derive(Debug)]
pub enum LockError {
    Timeout,
    Io(io::Error),
}

impl From<io::Error> for LockError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "lock acquisition timed out"),
            Self::Io(e) => write!(f, "lock I/O error: {e}"),
        }
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timeout => None,
            Self::Io(e) => Some(e),
        }
    }
}

/// Try to acquire an exclusive (write) lock on the file with timeout.
///
/// # Errors
/// - `LockError::Timeout` if the lock cannot be acquired within `timeout_ms`
/// - `LockError::Io` for other I/O errors
pub fn try_lock_exclusive_with_timeout(file: &File, timeout_ms: u64) -> Result<(), LockError> {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let poll_interval = Duration::from_millis(LOCK_POLL_INTERVAL_MS);

    loop {
        match file.try_lock() {
            Ok(()) => return Ok(()),
            Err(TryLockError::WouldBlock) => {
                if start.elapsed() >= timeout {
                    return Err(LockError::Timeout);
                }
                thread::sleep(poll_interval);
            }
            Err(TryLockError::Error(e)) => return Err(LockError::Io(e)),
        }
    }
}

/// Try to acquire a shared (read) lock on the file with timeout.
///
/// # Errors
/// - `LockError::Timeout` if the lock cannot be acquired within `timeout_ms`
/// - `LockError::Io` for other I/O errors
pub fn try_lock_shared_with_timeout(file: &File, timeout_ms: u64) -> Result<(), LockError> {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let poll_interval = Duration::from_millis(LOCK_POLL_INTERVAL_MS);

    loop {
        match file.try_lock_shared() {
            Ok(()) => return Ok(()),
            Err(TryLockError::WouldBlock) => {
                if start.elapsed() >= timeout {
                    return Err(LockError::Timeout);
                }
                thread::sleep(poll_interval);
            }
            Err(TryLockError::Error(e)) => return Err(LockError::Io(e)),
        }
    }
}

/// Unlock a file, releasing any held lock. Unlock failures are non-critical
/// and ignored.
pub fn unlock_file(file: &File) {
    let _ = file.unlock();
}

/// Write `bytes` to `path` atomically: serialize to a sibling temp file, take
/// an exclusive lock on the target, then rename over it. The original file
/// is preserved on any failure.
///
/// # Errors
/// Returns an I/O error when the temp file cannot be written or the rename
/// fails; a lock timeout yields `Ok(SaveOutcome::Skipped)`.
pub fn atomic_write_with_lock(path: &Path, bytes: &[u8]) -> io::Result<SaveOutcome> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = Path::new(&temp);
    fs::write(temp, bytes)?;

    let target = File::options().create(true).append(true).open(path)?;
    match try_lock_exclusive_with_timeout(&target, DEFAULT_LOCK_TIMEOUT_MS) {
        Ok(()) => {}
        Err(LockError::Timeout) => {
            let _ = fs::remove_file(temp);
            return Ok(SaveOutcome::Skipped);
        }
        Err(LockError::Io(e)) => {
            let _ = fs::remove_file(temp);
            return Err(e);
        }
    }

    let renamed = fs::rename(temp, path);
    unlock_file(&target);
    renamed.map(|()| SaveOutcome::Saved)
}

#[cfg(test)]
#[path = "fs_utils_tests.rs"]
mod tests;
