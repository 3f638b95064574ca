//! Direct HTTP transfer: HEAD probe, ranged GET, append to the locked temp file.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::{TransferReport, TransferStrategy};
use crate::download::client::{HttpClient, stream_to_sink};
use crate::download::error::DownloadError;
use crate::download::lock::TransferLock;
use crate::download::probe::{Probe, ResumePlan};
use crate::download::target::DownloadTarget;

/// Downloads over HTTP(S) with the shared [`HttpClient`].
///
/// The lock is taken on `<final>.download` itself, so the bytes being written
/// are the locked file.
#[derive(Debug, Clone, Default)]
pub struct DirectHttp {
    client: HttpClient,
}

impl DirectHttp {
    /// Creates the strategy around a configured client.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

/// Number of existing bytes to keep given the plan and the response status.
///
/// A `200 OK` to a ranged request carries the whole body, so nothing is kept.
fn kept_prefix(plan: ResumePlan, status: StatusCode) -> u64 {
    match plan {
        ResumePlan::From(offset) if status == StatusCode::PARTIAL_CONTENT => offset,
        ResumePlan::From(offset) => {
            if offset > 0 {
                warn!(
                    offset,
                    status = status.as_u16(),
                    "server ignored range request, restarting from zero"
                );
            }
            0
        }
        ResumePlan::Full => 0,
    }
}

#[async_trait]
impl TransferStrategy for DirectHttp {
    fn name(&self) -> &'static str {
        "direct-http"
    }

    fn lock_path(&self, target: &DownloadTarget) -> PathBuf {
        target.temp_file_path()
    }

    fn partial_path(&self, target: &DownloadTarget) -> Option<PathBuf> {
        Some(target.temp_file_path())
    }

    async fn probe(&self, target: &DownloadTarget) -> Probe {
        self.client.probe(target.url()).await
    }

    async fn transfer(
        &self,
        target: &DownloadTarget,
        plan: ResumePlan,
        lock: &TransferLock,
    ) -> Result<TransferReport, DownloadError> {
        let url = target.url();
        let mut plan = plan;
        let range = plan.range_header();
        let response = match self.client.get(url, range.as_deref()).await {
            Err(DownloadError::HttpStatus { status, .. })
                if status == StatusCode::RANGE_NOT_SATISFIABLE.as_u16() && range.is_some() =>
            {
                warn!(
                    offset = plan.offset(),
                    "range not satisfiable, discarding partial file and restarting from zero"
                );
                plan = ResumePlan::Full;
                self.client.get(url, None).await?
            }
            other => other?,
        };

        let kept = kept_prefix(plan, response.status());
        let current = lock.len()?;
        if current < kept {
            return Err(DownloadError::io(
                lock.path(),
                std::io::Error::other(format!(
                    "partial file shrank to {current} bytes, expected at least {kept}"
                )),
            ));
        }
        if current > kept {
            debug!(from = current, to = kept, "truncating partial file");
            lock.truncate(kept)?;
        }

        let sink = lock.sink()?;
        let bytes_written = stream_to_sink(sink, response, url, lock.path()).await?;
        info!(
            bytes = bytes_written,
            resumed_from = kept,
            path = %lock.path().display(),
            "transfer finished"
        );

        Ok(TransferReport {
            staged_path: lock.path().to_path_buf(),
            bytes_written,
            resumed: kept > 0,
        })
    }

    async fn finalize(
        &self,
        target: &DownloadTarget,
        report: TransferReport,
    ) -> Result<PathBuf, DownloadError> {
        let final_path = target.save_file_path();
        tokio::fs::rename(&report.staged_path, &final_path)
            .await
            .map_err(|e| DownloadError::finalize(&report.staged_path, &final_path, e))?;
        debug!(path = %final_path.display(), "promoted temporary file");
        Ok(final_path)
    }
}
