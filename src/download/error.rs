//! Error types for the download module.
//!
//! Every variant carries the URL or path it concerns so callers can log the
//! failure without extra bookkeeping. Probe failures are never represented
//! here: they degrade to "unknown" values instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or running a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The download directory could not be created or is not writable.
    #[error("directory '{path}' is not writable: {source}")]
    Filesystem {
        /// The directory that failed validation.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Another process holds the advisory lock on the transfer file.
    #[error("another process has locked this file: {path}")]
    Locked {
        /// The lock file that could not be acquired.
        path: PathBuf,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during transfer (open, truncate, write).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Promoting the temporary file to its final name failed.
    #[error("failed to move {from} to {to}: {source}")]
    Finalize {
        /// The temporary file, left in place for a later resume.
        from: PathBuf,
        /// The intended final path.
        to: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The provided proxy string could not be parsed.
    #[error("invalid proxy '{proxy}': {source}")]
    InvalidProxy {
        /// The rejected proxy string.
        proxy: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// A header name or value given in the client options is not valid HTTP.
    #[error("invalid header '{name}'")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },

    /// The HTTP client could not be built from the supplied options.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// No usable external download tool was found on `PATH`.
    #[error("external tool not found: {tool}")]
    ToolNotFound {
        /// The tool (or tools) that were searched for.
        tool: String,
    },

    /// The external tool could not be run or exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    ToolFailed {
        /// The tool that failed.
        tool: String,
        /// Exit status or captured stderr.
        message: String,
    },

    /// The external tool finished but did not produce the expected file.
    #[error("expected {expected} but the download produced {actual}")]
    UnexpectedOutput {
        /// The configured save filename.
        expected: String,
        /// What the tool reported instead.
        actual: String,
    },
}

/// Coarse classification of a [`DownloadError`] for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Directory or local IO problems.
    Filesystem,
    /// Lock contention with another process.
    Concurrency,
    /// Network, timeout, or non-2xx response during the transfer.
    Transfer,
    /// Invalid URL, proxy, header, or client configuration.
    Configuration,
    /// External tool missing or failing.
    Tool,
}

impl DownloadError {
    /// Creates a filesystem (directory validation) error.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Creates a lock-contention error.
    pub fn locked(path: impl Into<PathBuf>) -> Self {
        Self::Locked { path: path.into() }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Maps a reqwest send/stream error, promoting timeouts to [`DownloadError::Timeout`].
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a finalization (rename) error.
    pub fn finalize(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Finalize {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an external tool failure.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Returns the coarse category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Filesystem { .. } | Self::Io { .. } | Self::Finalize { .. } => {
                ErrorCategory::Filesystem
            }
            Self::Locked { .. } => ErrorCategory::Concurrency,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                ErrorCategory::Transfer
            }
            Self::InvalidUrl { .. }
            | Self::InvalidProxy { .. }
            | Self::InvalidHeader { .. }
            | Self::ClientBuild { .. } => ErrorCategory::Configuration,
            Self::ToolNotFound { .. } | Self::ToolFailed { .. } | Self::UnexpectedOutput { .. } => {
                ErrorCategory::Tool
            }
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path the source error does not carry.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/file.bin");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/file.bin"));
        assert_eq!(error.category(), ErrorCategory::Transfer);
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/movie.mp4", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(
            msg.contains("https://example.com/movie.mp4"),
            "Expected URL in: {msg}"
        );
        assert_eq!(error.category(), ErrorCategory::Transfer);
    }

    #[test]
    fn test_download_error_locked_display() {
        let error = DownloadError::locked("/tmp/movie.mp4.download");
        let msg = error.to_string();
        assert!(
            msg.contains("another process has locked this file"),
            "Expected lock message in: {msg}"
        );
        assert!(msg.contains("movie.mp4.download"), "Expected path in: {msg}");
        assert_eq!(error.category(), ErrorCategory::Concurrency);
    }

    #[test]
    fn test_download_error_filesystem_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::filesystem("/root/locked", io_error);
        let msg = error.to_string();
        assert!(msg.contains("/root/locked"), "Expected path in: {msg}");
        assert!(msg.contains("not writable"), "Expected reason in: {msg}");
        assert_eq!(error.category(), ErrorCategory::Filesystem);
    }

    #[test]
    fn test_download_error_finalize_keeps_both_paths() {
        let io_error = std::io::Error::other("cross-device link");
        let error = DownloadError::finalize("/a/file.bin.download", "/b/file.bin", io_error);
        let msg = error.to_string();
        assert!(msg.contains("/a/file.bin.download"));
        assert!(msg.contains("/b/file.bin"));
    }

    #[test]
    fn test_download_error_invalid_url_display() {
        let error = DownloadError::invalid_url("not-a-url");
        let msg = error.to_string();
        assert!(
            msg.contains("invalid URL"),
            "Expected 'invalid URL' in: {msg}"
        );
        assert!(msg.contains("not-a-url"), "Expected URL in: {msg}");
        assert_eq!(error.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_download_error_tool_variants_are_tool_category() {
        let missing = DownloadError::ToolNotFound {
            tool: "yt-dlp".to_string(),
        };
        let failed = DownloadError::tool_failed("yt-dlp", "exit status: 1");
        assert_eq!(missing.category(), ErrorCategory::Tool);
        assert_eq!(failed.category(), ErrorCategory::Tool);
        assert!(failed.to_string().starts_with("yt-dlp failed"));
    }
}
