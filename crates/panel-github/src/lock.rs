//! Cache lock file.
//!
//! Multiple panel processes may share one cache directory. A sentinel file
//! created with `create_new` keeps them from fetching concurrently; the
//! holder removes it on drop. A lock older than the stale threshold is
//! assumed to belong to a crashed process and is taken over.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};

/// How old a lock file must be before another process takes it over.
pub const STALE_AFTER: Duration = Duration::from_secs(10 * 60);

/// RAII guard for the cache lock. Dropping releases it.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    /// Try to take the lock next to `cache_path`.
    ///
    /// Returns `Ok(None)` when another live process holds it.
    pub fn acquire(cache_path: &Path) -> Result<Option<Self>> {
        Self::acquire_with_staleness(cache_path, STALE_AFTER)
    }

    fn acquire_with_staleness(cache_path: &Path, stale_after: Duration) -> Result<Option<Self>> {
        let path = lock_path(cache_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent))?;
            }
        }

        // Second attempt happens after a stale takeover.
        for attempt in 0..2 {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(_) => return Ok(Some(Self { path })),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempt > 0 || !is_stale(&path, stale_after) {
                        return Ok(None);
                    }
                    log::warn!("taking over stale cache lock at {}", path.display());
                    match std::fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return Err(Error::io(e, &path)),
                    }
                }
                Err(e) => return Err(Error::io(e, &path)),
            }
        }
        Ok(None)
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to release cache lock {}: {e}", self.path.display());
            }
        }
    }
}

fn lock_path(cache_path: &Path) -> PathBuf {
    let mut path = cache_path.as_os_str().to_owned();
    path.push(".lock");
    PathBuf::from(path)
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        // Vanished between the failed create and now; let the retry race.
        return true;
    };
    match metadata.modified() {
        Ok(modified) => SystemTime::now()
            .duration_since(modified)
            .map(|age| age > stale_after)
            .unwrap_or(false),
        Err(_) => false,
    }
}
