//! Download target resolution: final path, temporary path, and lock path.
//!
//! A [`DownloadTarget`] is built once, before any transfer starts, from a URL,
//! an optional download directory, an optional explicit filename, and an
//! optional save-path template. Directory validation happens eagerly in
//! [`TargetBuilder::build`] so that filesystem problems surface at
//! configuration time rather than mid-transfer.

use std::borrow::Cow;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use super::constants::{LOCK_SUFFIX, TEMP_SUFFIX};
use super::error::DownloadError;

/// Placeholder for the download directory.
pub const DIR_PLACEHOLDER: &str = "%(dir)";
/// Placeholder for the full filename (with extension).
pub const FILENAME_PLACEHOLDER: &str = "%(filename)";
/// Placeholder for the filename without extension.
pub const NAME_PLACEHOLDER: &str = "%(name)";
/// Placeholder for the extension (without the dot).
pub const EXT_PLACEHOLDER: &str = "%(ext)";

/// Where a download is saved. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    url: Url,
    download_dir: PathBuf,
    save_filename: String,
}

impl DownloadTarget {
    /// Starts building a target for `url`.
    #[must_use]
    pub fn builder(url: impl Into<String>) -> TargetBuilder {
        TargetBuilder::new(url)
    }

    /// The resource being fetched.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Directory the final artifact is written to.
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Basename of the final artifact.
    #[must_use]
    pub fn save_filename(&self) -> &str {
        &self.save_filename
    }

    /// `<download_dir>/<save_filename>`, recomputed on every call.
    #[must_use]
    pub fn save_file_path(&self) -> PathBuf {
        self.download_dir.join(&self.save_filename)
    }

    /// `<save_file_path>.download`, the in-progress artifact.
    #[must_use]
    pub fn temp_file_path(&self) -> PathBuf {
        with_suffix(self.save_file_path(), TEMP_SUFFIX)
    }

    /// `<save_file_path>.lock`, used by strategies that do not write the temp file themselves.
    #[must_use]
    pub fn lock_file_path(&self) -> PathBuf {
        with_suffix(self.save_file_path(), LOCK_SUFFIX)
    }
}

fn with_suffix(path: PathBuf, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.into_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Builder producing a validated [`DownloadTarget`].
#[derive(Debug, Clone, Default)]
pub struct TargetBuilder {
    url: String,
    download_dir: Option<PathBuf>,
    save_filename: Option<String>,
    save_as: Option<String>,
}

impl TargetBuilder {
    /// Creates a builder for `url`; nothing is validated until [`build`](Self::build).
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// The raw URL this builder was created with.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sets the download directory. Defaults to the working directory.
    #[must_use]
    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Sets the save filename explicitly instead of deriving it from the URL.
    #[must_use]
    pub fn save_filename(mut self, filename: impl Into<String>) -> Self {
        self.save_filename = Some(filename.into());
        self
    }

    /// Whether an explicit, non-empty filename was provided.
    #[must_use]
    pub fn has_save_filename(&self) -> bool {
        self.save_filename.as_deref().is_some_and(|name| !name.is_empty())
    }

    /// Sets a save-path template, applied after the directory and filename are known.
    ///
    /// Supports `%(dir)`, `%(filename)`, `%(name)` and `%(ext)`.
    #[must_use]
    pub fn save_as(mut self, template: impl Into<String>) -> Self {
        self.save_as = Some(template.into());
        self
    }

    /// Resolves and validates the target.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] if the URL does not parse, or
    /// [`DownloadError::Filesystem`] if the resolved directory cannot be
    /// created or written to.
    pub fn build(self) -> Result<DownloadTarget, DownloadError> {
        let url = Url::parse(&self.url).map_err(|_| DownloadError::invalid_url(&self.url))?;

        let download_dir = match self.download_dir {
            Some(dir) => dir,
            None => default_download_dir()?,
        };
        let save_filename = self
            .save_filename
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| resolve_save_filename(&url));

        let (download_dir, save_filename) = match self.save_as.as_deref() {
            Some(template) => apply_path_template(template, &download_dir, &save_filename),
            None => (download_dir, save_filename),
        };

        ensure_writable_directory(&download_dir)?;
        debug!(
            dir = %download_dir.display(),
            filename = %save_filename,
            "resolved download target"
        );

        Ok(DownloadTarget {
            url,
            download_dir,
            save_filename,
        })
    }
}

/// The default download directory: the process working directory.
///
/// Resolved once by [`TargetBuilder::build`]; the engine never consults it.
///
/// # Errors
///
/// Returns [`DownloadError::Filesystem`] if the working directory is unavailable.
pub fn default_download_dir() -> Result<PathBuf, DownloadError> {
    std::env::current_dir().map_err(|e| DownloadError::filesystem(".", e))
}

/// Derives a save filename from the last URL path segment.
///
/// Falls back to a SHA-256 hex digest of the URL when the path yields no
/// usable name (e.g. `https://example.com/`). Never fails.
#[must_use]
pub fn resolve_save_filename(url: &Url) -> String {
    if let Some(mut segments) = url.path_segments()
        && let Some(last) = segments.next_back()
        && !last.is_empty()
    {
        let decoded = urlencoding::decode(last).unwrap_or(Cow::Borrowed(last));
        let sanitized = sanitize_filename(&decoded);
        if !sanitized.trim_matches('_').is_empty() {
            return sanitized;
        }
    }

    format!("{:x}", Sha256::digest(url.as_str().as_bytes()))
}

/// Applies a save-path template to the current directory and filename.
///
/// Placeholders are substituted in a single pass, so a directory that itself
/// contains `%(name)` is not expanded twice. A trailing `.` left by an empty
/// `%(ext)` is dropped, then one trailing path separator, and the rest is split
/// into directory and filename. Each returned component replaces the current
/// one only when it is non-empty.
#[must_use]
pub fn apply_path_template(
    template: &str,
    current_dir: &Path,
    current_filename: &str,
) -> (PathBuf, String) {
    let mut expanded = if has_placeholder(template) {
        let (name, ext) = split_extension(current_filename);
        let dir = current_dir.to_string_lossy();
        substitute(
            template,
            &[
                (DIR_PLACEHOLDER, dir.as_ref()),
                (FILENAME_PLACEHOLDER, current_filename),
                (NAME_PLACEHOLDER, name),
                (EXT_PLACEHOLDER, ext),
            ],
        )
    } else {
        template.to_string()
    };

    if expanded.ends_with('.') {
        expanded.pop();
    }

    let trimmed = strip_trailing_separator(&expanded);
    let path = Path::new(trimmed);
    let dir_part = path.parent().map(Path::to_path_buf);
    let file_part = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let dir = dir_part
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| current_dir.to_path_buf());
    let filename = file_part
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| current_filename.to_string());
    (dir, filename)
}

fn has_placeholder(template: &str) -> bool {
    [
        DIR_PLACEHOLDER,
        FILENAME_PLACEHOLDER,
        NAME_PLACEHOLDER,
        EXT_PLACEHOLDER,
    ]
    .iter()
    .any(|placeholder| template.contains(placeholder))
}

fn substitute(template: &str, replacements: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'outer: while !rest.is_empty() {
        for (key, value) in replacements {
            if let Some(after) = rest.strip_prefix(key) {
                out.push_str(value);
                rest = after;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            out.push(ch);
        }
        rest = chars.as_str();
    }
    out
}

/// Drops at most one trailing path separator.
fn strip_trailing_separator(path: &str) -> &str {
    path.strip_suffix('/')
        .or_else(|| path.strip_suffix(MAIN_SEPARATOR))
        .unwrap_or(path)
}

/// Splits `movie.mp4` into (`movie`, `mp4`); names without a dot have an empty extension.
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos + 1..]),
        _ => (filename, ""),
    }
}

/// Creates `dir` (and parents) if missing, then checks it accepts new files.
///
/// # Errors
///
/// Returns [`DownloadError::Filesystem`] if creation fails or a probe file
/// cannot be written.
pub fn ensure_writable_directory(dir: &Path) -> Result<(), DownloadError> {
    std::fs::create_dir_all(dir).map_err(|e| DownloadError::filesystem(dir, e))?;

    let probe = dir.join(format!(".resumer-write-probe-{}", std::process::id()));
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
        .map_err(|e| DownloadError::filesystem(dir, e))?;
    if let Err(e) = std::fs::remove_file(&probe) {
        debug!(path = %probe.display(), error = %e, "could not remove write probe");
    }
    Ok(())
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
