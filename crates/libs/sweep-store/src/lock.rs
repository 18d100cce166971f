//! Cross-process advisory locking.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::thread::sleep;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::prelude::*;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An acquired advisory lock on a store's `lockfile`.
///
/// Exclusive for the merge-and-write step of an upsert, shared for reads.
/// The lock is scoped narrowly to those steps and never held across job
/// execution. Released on drop (and by the OS if the process dies).
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Acquire the lock exclusively, waiting at most `timeout`.
    pub fn exclusive(path: &Path, timeout: Duration) -> Result<Self> {
        // Fully qualified: std::fs::File has grown inherent lock methods
        // with different signatures.
        Self::acquire(path, timeout, |file| FileExt::try_lock_exclusive(file))
    }

    /// Acquire the lock shared, waiting at most `timeout`.
    pub fn shared(path: &Path, timeout: Duration) -> Result<Self> {
        Self::acquire(path, timeout, |file| FileExt::try_lock_shared(file))
    }

    fn acquire(
        path: &Path,
        timeout: Duration,
        try_lock: impl Fn(&File) -> std::io::Result<()>,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        let deadline = Instant::now() + timeout;
        loop {
            match try_lock(&file) {
                Ok(()) => {
                    debug!(path = %path.display(), "store lock acquired");
                    return Ok(Self { file });
                }
                Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(Error::LockTimeout {
                            path: path.to_path_buf(),
                            timeout,
                        });
                    }
                    sleep(POLL_INTERVAL);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn contended_exclusive_lock_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lockfile");

        let _held = StoreLock::exclusive(&path, Duration::from_secs(1)).unwrap();
        let err = StoreLock::exclusive(&path, Duration::from_millis(120)).unwrap_err();
        assert!(matches!(err, Error::LockTimeout { .. }));
    }

    #[test]
    fn shared_locks_coexist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lockfile");

        let _a = StoreLock::shared(&path, Duration::from_secs(1)).unwrap();
        let _b = StoreLock::shared(&path, Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lockfile");

        drop(StoreLock::exclusive(&path, Duration::from_secs(1)).unwrap());
        StoreLock::exclusive(&path, Duration::from_millis(100)).unwrap();
    }
}
