//! The download state machine.
//!
//! [`Downloader::download`] runs, for one target:
//!
//! 1. **Complete check**: if the final file already matches the remote size,
//!    stale partial data is removed and nothing is transferred.
//! 2. **Lock**: a non-blocking exclusive lock on the strategy's lock file.
//!    Contention fails immediately with [`DownloadError::Locked`].
//! 3. **Resume setup**: a fresh probe plus the partial file's length give a
//!    [`ResumePlan`].
//! 4. **Transfer**: the strategy moves the bytes; the lock is released on
//!    every exit path.
//! 5. **Finalize**: the staged file is promoted to its final name. On failure
//!    the staged file stays in place for the next attempt.
//!
//! # Example
//!
//! ```no_run
//! use resumer_core::download::{DownloadTarget, Downloader, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Downloader::direct(HttpClient::new());
//! let target = downloader
//!     .resolve_target(DownloadTarget::builder("https://example.com/movie.mp4").download_dir("/tmp"))
//!     .await?;
//! let outcome = downloader.download(&target).await?;
//! println!("saved to {}", outcome.path().display());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::error::DownloadError;
use super::lock::TransferLock;
use super::probe::{ResumePlan, local_size, percentage};
use super::strategy::{DirectHttp, ExternalTool, TransferStrategy};
use super::target::{DownloadTarget, TargetBuilder};

/// How a successful [`Downloader::download`] call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The final file already matched the remote size; nothing was fetched.
    AlreadyComplete {
        /// The existing final file.
        path: PathBuf,
    },
    /// Bytes were transferred and the file was promoted to its final name.
    Completed {
        /// The final file.
        path: PathBuf,
        /// Bytes transferred by this call.
        bytes_written: u64,
        /// Whether earlier partial data was kept.
        resumed: bool,
    },
}

impl DownloadOutcome {
    /// The final file's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::AlreadyComplete { path } | Self::Completed { path, .. } => path,
        }
    }
}

/// Resumable single-file downloader.
///
/// Holds no per-target state: every query re-probes the remote and re-stats
/// the local files, so a single instance can serve any number of targets.
#[derive(Debug)]
pub struct Downloader {
    strategy: Box<dyn TransferStrategy>,
}

impl Downloader {
    /// Creates a downloader around any strategy.
    #[must_use]
    pub fn new(strategy: impl TransferStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
        }
    }

    /// Direct HTTP(S) downloads.
    #[must_use]
    pub fn direct(client: HttpClient) -> Self {
        Self::new(DirectHttp::new(client))
    }

    /// Downloads delegated to an external tool.
    #[must_use]
    pub fn external(tool: ExternalTool) -> Self {
        Self::new(tool)
    }

    /// The active strategy.
    #[must_use]
    pub fn strategy(&self) -> &dyn TransferStrategy {
        self.strategy.as_ref()
    }

    /// Builds a target, asking the strategy for a filename when none was set.
    ///
    /// # Errors
    ///
    /// Propagates [`TargetBuilder::build`] errors.
    pub async fn resolve_target(&self, builder: TargetBuilder) -> Result<DownloadTarget, DownloadError> {
        if builder.has_save_filename() {
            return builder.build();
        }

        let url = url::Url::parse(builder.url()).map_err(|_| DownloadError::invalid_url(builder.url()))?;
        match self.strategy.suggest_filename(&url).await {
            Some(name) => {
                debug!(filename = %name, "using suggested filename");
                builder.save_filename(name).build()
            }
            None => builder.build(),
        }
    }

    /// Remote size from a fresh probe, or `None` when unknown.
    pub async fn probe_remote_size(&self, target: &DownloadTarget) -> Option<u64> {
        self.strategy.probe(target).await.expected_size
    }

    /// Whether the remote advertises byte-range support. Fresh probe each call.
    pub async fn probe_range_support(&self, target: &DownloadTarget) -> bool {
        self.strategy.probe(target).await.supports_range
    }

    /// True iff the final file exists and its size equals the probed remote size.
    pub async fn is_finished(&self, target: &DownloadTarget) -> bool {
        let Some(local) = local_size(&target.save_file_path()).await else {
            return false;
        };
        self.probe_remote_size(target)
            .await
            .is_some_and(|remote| remote == local)
    }

    /// Progress in percent, rounded to two decimals and clamped to `[0, 100]`.
    ///
    /// Measures the final file if present, otherwise the partial file.
    /// `0.0` whenever either size is unknown or zero.
    pub async fn progress_percentage(&self, target: &DownloadTarget) -> f64 {
        let mut local = local_size(&target.save_file_path()).await;
        if local.is_none()
            && let Some(partial) = self.strategy.partial_path(target)
        {
            local = local_size(&partial).await;
        }
        if local.is_none() {
            return 0.0;
        }
        percentage(local, self.probe_remote_size(target).await)
    }

    /// Probes the remote and decides where the next transfer starts.
    pub async fn prepare_resume(&self, target: &DownloadTarget) -> ResumePlan {
        let probe = self.strategy.probe(target).await;
        let partial_len = match self.strategy.partial_path(target) {
            Some(partial) => local_size(&partial).await,
            None => None,
        };
        self.strategy.resume(&probe, partial_len)
    }

    /// Downloads `target`, resuming from any partial file.
    ///
    /// Calling this again after success is a no-op returning
    /// [`DownloadOutcome::AlreadyComplete`].
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Locked`] if another process is downloading the same target
    /// - transfer errors (network, timeout, HTTP status, IO, tool failure)
    /// - [`DownloadError::Finalize`] if the rename fails; the partial file is kept
    #[instrument(skip(self, target), fields(url = %target.url(), strategy = self.strategy.name()))]
    pub async fn download(&self, target: &DownloadTarget) -> Result<DownloadOutcome, DownloadError> {
        let final_path = target.save_file_path();

        if self.is_finished(target).await {
            if let Some(partial) = self.strategy.partial_path(target) {
                remove_if_present(&partial).await;
            }
            info!(path = %final_path.display(), "already downloaded");
            return Ok(DownloadOutcome::AlreadyComplete { path: final_path });
        }

        let lock_path = self.strategy.lock_path(target);
        let lock = TransferLock::try_acquire(&lock_path)?;

        let plan = self.prepare_resume(target).await;
        debug!(?plan, "resume plan");

        let transferred = self.strategy.transfer(target, plan, &lock).await;
        drop(lock);
        if self.strategy.removes_lock_file() {
            remove_if_present(&lock_path).await;
        }
        let report = transferred?;

        let bytes_written = report.bytes_written;
        let resumed = report.resumed;
        let path = self.strategy.finalize(target, report).await?;
        info!(path = %path.display(), bytes = bytes_written, resumed, "download complete");

        Ok(DownloadOutcome::Completed {
            path,
            bytes_written,
            resumed,
        })
    }
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove file"),
    }
}
