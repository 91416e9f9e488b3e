//! Per-file exclusive locks using sidecar `.lock` files.
//!
//! Acquiring creates `<file>.lock` with `create_new`, which is atomic on a
//! shared filesystem: exactly one process wins. Losers poll until the timeout.
//! The guard removes the sidecar on drop. A lock left behind by a crashed
//! process must be removed by hand.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::provider::DataError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Held exclusive lock on one data file.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    /// Sidecar path guarding `target`.
    pub fn lock_path_for(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Block until the lock on `target` is acquired or `timeout` elapses.
    pub fn acquire(target: &Path, timeout: Duration) -> Result<Self, DataError> {
        let lock_path = Self::lock_path_for(target);
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut file) => {
                    // Holder pid is informational only.
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(path = %lock_path.display(), "lock acquired");
                    return Ok(Self { lock_path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(DataError::LockTimeout {
                            path: target.to_path_buf(),
                            waited,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL.min(timeout - waited));
                }
                Err(e) => return Err(DataError::io(&lock_path, e)),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            warn!(path = %self.lock_path.display(), error = %e, "failed to release lock");
        }
    }
}
