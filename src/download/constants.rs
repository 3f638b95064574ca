//! Constants for the download module (timeouts, on-disk suffixes, tool defaults).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default total timeout for HEAD probes (30 seconds).
///
/// The streaming GET deliberately has no total timeout.
pub const PROBE_TIMEOUT_SECS: u64 = 30;

/// Suffix appended to the final path for the in-progress artifact.
pub const TEMP_SUFFIX: &str = ".download";

/// Suffix appended to the final path for the external-tool lock file.
pub const LOCK_SUFFIX: &str = ".lock";

/// The only `Accept-Ranges` token that enables resuming.
pub const BYTE_RANGE_UNIT: &str = "bytes";

/// Output template used when asking the external tool for a filename.
pub const TOOL_FILENAME_TEMPLATE: &str = "%(title)s-%(id)s.%(ext)s";

/// Default aria2c split size when the caller passes something unusable.
pub const DEFAULT_ARIA2C_SPLIT_SIZE: &str = "20M";

/// Default aria2c arguments exposed by the CLI.
pub const DEFAULT_ARIA2C_ARGS: &str = "-x 1 -k 20M";
