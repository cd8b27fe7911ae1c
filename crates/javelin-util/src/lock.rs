//! Per-coordinate file locks for the on-disk artifact cache.
//!
//! Two processes fetching the same coordinate must not write the same cache
//! file concurrently. The lock is a sibling `<file>.lock` created with
//! `create_new`; the holder removes it on drop. Stale locks (older than
//! [`STALE_AFTER`]) are broken, so a crashed process cannot wedge the cache.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::JavelinError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STALE_AFTER: Duration = Duration::from_secs(600);
const MAX_WAIT: Duration = Duration::from_secs(120);

/// An exclusive lock over one artifact coordinate's cache files.
#[derive(Debug)]
pub struct CoordinateLock {
    path: PathBuf,
}

impl CoordinateLock {
    /// Acquire the lock guarding `target`, blocking until it is free.
    pub fn acquire(target: &Path) -> miette::Result<Self> {
        let path = lock_path(target);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(JavelinError::Io)?;
        }

        let start = std::time::Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path) {
                        tracing::warn!("breaking stale lock {}", path.display());
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if start.elapsed() > MAX_WAIT {
                        return Err(JavelinError::Generic {
                            message: format!(
                                "timed out waiting for lock {}",
                                path.display()
                            ),
                        }
                        .into());
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(JavelinError::Io(e).into()),
            }
        }
    }
}

impl Drop for CoordinateLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".to_string());
    name.push_str(".lock");
    target.with_file_name(name)
}

fn lock_is_stale(path: &Path) -> bool {
    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => std::time::SystemTime::now()
            .duration_since(modified)
            .map(|age| age > STALE_AFTER)
            .unwrap_or(false),
        Err(_) => false,
    }
}
