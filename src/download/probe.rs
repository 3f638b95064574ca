//! Remote capability probing results and the pure resume/progress arithmetic.
//!
//! Nothing here is cached: every accessor on the engine builds a fresh
//! [`Probe`] and re-stats local files.

use std::path::Path;

use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap};
use tracing::debug;

use super::constants::BYTE_RANGE_UNIT;

/// What a HEAD request revealed about the remote resource.
///
/// Probe failures produce [`Probe::unknown`] instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Probe {
    /// Byte length reported by the remote, when known.
    pub expected_size: Option<u64>,
    /// True only when the remote advertised `Accept-Ranges: bytes`.
    pub supports_range: bool,
}

impl Probe {
    /// A probe that learned nothing: unknown size, no range support.
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Reads `Content-Length` and `Accept-Ranges` from response headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            expected_size: content_length(headers),
            supports_range: accepts_byte_ranges(headers),
        }
    }
}

/// Parses `Content-Length`; absent, empty, or malformed values are unknown.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<u64>().ok())
}

/// True iff `Accept-Ranges` is exactly `bytes`.
pub(crate) fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT_RANGES)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == BYTE_RANGE_UNIT)
}

/// How the next GET should be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePlan {
    /// Fetch the whole body; the temporary file is truncated first.
    Full,
    /// Send `Range: bytes=<offset>-` and keep the first `offset` bytes.
    From(u64),
}

impl ResumePlan {
    /// The `Range` header value, if any.
    #[must_use]
    pub fn range_header(&self) -> Option<String> {
        match self {
            Self::Full => None,
            Self::From(offset) => Some(format!("bytes={offset}-")),
        }
    }

    /// Number of existing bytes the plan keeps.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::Full => 0,
            Self::From(offset) => *offset,
        }
    }
}

/// Computes the resume plan from a probe and the partial file's length.
///
/// Without range support the plan is always [`ResumePlan::Full`]. Otherwise
/// the offset is the partial length (0 when unknown), capped at
/// `remote_size - 1` when the remote size is known and positive so the
/// request never starts at or past end-of-file.
#[must_use]
pub fn plan_resume(probe: &Probe, partial_len: Option<u64>) -> ResumePlan {
    if !probe.supports_range {
        return ResumePlan::Full;
    }

    let from_offset = partial_len.unwrap_or(0);
    match probe.expected_size {
        Some(size) if size > 0 => ResumePlan::From(from_offset.min(size - 1)),
        _ => ResumePlan::From(from_offset),
    }
}

/// Current byte length of `path`, or `None` if it does not exist or cannot be stat'ed.
///
/// Always re-reads metadata from the filesystem.
pub async fn local_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        Ok(_) => None,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %path.display(), error = %e, "stat failed");
            }
            None
        }
    }
}

/// `round(local / remote, 4) * 100`, clamped to `[0, 100]`.
///
/// Exactly `0.0` whenever either size is unknown or zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(local: Option<u64>, remote: Option<u64>) -> f64 {
    let (Some(local), Some(remote)) = (local, remote) else {
        return 0.0;
    };
    if local == 0 || remote == 0 {
        return 0.0;
    }

    let ratio = ((local as f64 / remote as f64) * 10_000.0).round() / 10_000.0;
    (ratio * 100.0).clamp(0.0, 100.0)
}
