//! Pluggable transfer strategies.
//!
//! The [`Downloader`](super::Downloader) drives a fixed sequence of states
//! (complete check, lock, resume setup, transfer, finalize) and delegates the
//! transport-specific parts to a [`TransferStrategy`] chosen at construction.
//!
//! - [`DirectHttp`]: HEAD probe plus a ranged GET appended to `<final>.download`.
//! - [`ExternalTool`]: hands the transfer to `yt-dlp` (optionally via `aria2c`).

mod direct;
mod external;

pub use direct::DirectHttp;
pub use external::ExternalTool;

use std::path::PathBuf;

use async_trait::async_trait;
use url::Url;

use super::error::DownloadError;
use super::lock::TransferLock;
use super::probe::{Probe, ResumePlan, plan_resume};
use super::target::DownloadTarget;

/// What a finished transfer left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Where the transferred bytes currently live (before finalization).
    pub staged_path: PathBuf,
    /// Bytes written during this transfer.
    pub bytes_written: u64,
    /// Whether previously downloaded bytes were kept.
    pub resumed: bool,
}

/// Transport-specific half of a download.
///
/// Implementations must be `Send + Sync` so a single
/// [`Downloader`](super::Downloader) can be shared across tasks.
#[async_trait]
pub trait TransferStrategy: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Proposes a save filename when the caller did not set one.
    ///
    /// Returning `None` falls back to the URL-derived name.
    async fn suggest_filename(&self, _url: &Url) -> Option<String> {
        None
    }

    /// The file whose advisory lock guards this target.
    fn lock_path(&self, target: &DownloadTarget) -> PathBuf;

    /// The partially downloaded file, if this strategy keeps one.
    fn partial_path(&self, _target: &DownloadTarget) -> Option<PathBuf> {
        None
    }

    /// Whether the lock file should be deleted once released.
    fn removes_lock_file(&self) -> bool {
        false
    }

    /// Learns the remote size and range support. Never fails.
    async fn probe(&self, target: &DownloadTarget) -> Probe;

    /// Decides where the transfer starts.
    fn resume(&self, probe: &Probe, partial_len: Option<u64>) -> ResumePlan {
        plan_resume(probe, partial_len)
    }

    /// Moves bytes while `lock` is held.
    async fn transfer(
        &self,
        target: &DownloadTarget,
        plan: ResumePlan,
        lock: &TransferLock,
    ) -> Result<TransferReport, DownloadError>;

    /// Promotes the staged file to its final location, returning that path.
    ///
    /// Runs after the lock has been released.
    async fn finalize(
        &self,
        target: &DownloadTarget,
        report: TransferReport,
    ) -> Result<PathBuf, DownloadError>;
}
