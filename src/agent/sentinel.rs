//! Sentinel files observed by the process supervisor
//!
//! Only the existence of a sentinel matters, never its content.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("Could not write sentinel file {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not delete sentinel file {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Create `path` if it does not exist; an existing file is left untouched
pub fn touch(path: &Path) -> Result<(), SentinelError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|source| SentinelError::Create {
            path: path.to_path_buf(),
            source,
        })
}

/// Delete `path` if present
///
/// Returns whether a file was actually removed.
pub fn remove_if_present(path: &Path) -> Result<bool, SentinelError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(SentinelError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// The broker-ready and session-connected sentinels
///
/// Clones share the set of files scheduled for deletion at exit.
#[derive(Debug, Clone)]
pub struct SentinelFiles {
    broker_ready: PathBuf,
    session_connected: PathBuf,
    delete_on_exit: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl SentinelFiles {
    pub fn new(broker_ready: impl Into<PathBuf>, session_connected: impl Into<PathBuf>) -> Self {
        Self {
            broker_ready: broker_ready.into(),
            session_connected: session_connected.into(),
            delete_on_exit: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn broker_ready(&self) -> &Path {
        &self.broker_ready
    }

    pub fn session_connected(&self) -> &Path {
        &self.session_connected
    }

    /// Delete sentinels left over from a previous run
    pub fn clear_stale(&self) -> Result<(), SentinelError> {
        for path in [&self.broker_ready, &self.session_connected] {
            if remove_if_present(path)? {
                debug!(path = %path.display(), "Removed stale sentinel file");
            }
        }
        Ok(())
    }

    /// Mark the broker as ready; the file is never removed while running
    pub fn mark_broker_ready(&self) -> Result<(), SentinelError> {
        self.touch_tracked(&self.broker_ready)
    }

    pub fn is_broker_ready(&self) -> bool {
        self.broker_ready.exists()
    }

    pub fn mark_session_connected(&self) -> Result<(), SentinelError> {
        if self.session_connected.exists() {
            return Ok(());
        }
        self.touch_tracked(&self.session_connected)
    }

    pub fn clear_session_connected(&self) -> Result<(), SentinelError> {
        remove_if_present(&self.session_connected).map(|_| ())
    }

    pub fn is_session_connected(&self) -> bool {
        self.session_connected.exists()
    }

    /// Best-effort deletion of every sentinel this process created
    pub fn cleanup_on_exit(&self) {
        let paths = std::mem::take(
            &mut *self
                .delete_on_exit
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for path in paths {
            if let Err(e) = remove_if_present(&path) {
                warn!(error = %e, "Sentinel cleanup failed");
            }
        }
    }

    fn touch_tracked(&self, path: &Path) -> Result<(), SentinelError> {
        touch(path)?;
        self.delete_on_exit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
#[path = "sentinel_test.rs"]
mod tests;
