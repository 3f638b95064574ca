//! Advisory exclusive locking of the on-disk transfer file.
//!
//! The lock is the only cross-process mutual exclusion: a second process
//! attempting the same target fails fast with [`DownloadError::Locked`]. The
//! lock is released when the [`TransferLock`] is dropped, which covers every
//! exit path including errors and panics. A crashed holder's lock is released
//! by the operating system.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use super::error::DownloadError;

/// An open, exclusively locked file opened in append mode.
#[derive(Debug)]
pub struct TransferLock {
    file: File,
    path: PathBuf,
}

impl TransferLock {
    /// Opens (creating if absent) `path` in append mode and takes a
    /// non-blocking exclusive lock on it.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Locked`] if another handle holds the lock, or
    /// [`DownloadError::Io`] if the file cannot be opened.
    pub fn try_acquire(path: &Path) -> Result<Self, DownloadError> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| DownloadError::io(path, e))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!(path = %path.display(), "acquired transfer lock");
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(DownloadError::locked(path))
            }
            Err(e) => Err(DownloadError::io(path, e)),
        }
    }

    /// The locked file's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the locked file.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the file cannot be stat'ed.
    pub fn len(&self) -> Result<u64, DownloadError> {
        self.file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|e| DownloadError::io(&self.path, e))
    }

    /// Truncates the locked file to `len` bytes. Appends continue at the new end.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if truncation fails.
    pub fn truncate(&self, len: u64) -> Result<(), DownloadError> {
        self.file
            .set_len(len)
            .map_err(|e| DownloadError::io(&self.path, e))
    }

    /// An async append handle sharing this file's open description (and lock).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the handle cannot be duplicated.
    pub fn sink(&self) -> Result<tokio::fs::File, DownloadError> {
        let handle = self
            .file
            .try_clone()
            .map_err(|e| DownloadError::io(&self.path, e))?;
        Ok(tokio::fs::File::from_std(handle))
    }
}

impl Drop for TransferLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release transfer lock");
        } else {
            debug!(path = %self.path.display(), "released transfer lock");
        }
    }
}
