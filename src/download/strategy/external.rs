//! Delegated transfer through `yt-dlp` (or `youtube-dl`), optionally using
//! `aria2c` as its external downloader.
//!
//! The tool owns the bytes: it resumes on its own, so this strategy reports
//! an unknown remote size and locks a sidecar `<final>.lock` file instead of
//! the payload.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use super::{TransferReport, TransferStrategy};
use crate::download::client::ClientOptions;
use crate::download::constants::{DEFAULT_ARIA2C_SPLIT_SIZE, TOOL_FILENAME_TEMPLATE};
use crate::download::error::DownloadError;
use crate::download::lock::TransferLock;
use crate::download::probe::{Probe, ResumePlan, local_size};
use crate::download::target::DownloadTarget;

/// Tools tried, in order, by [`ExternalTool::locate`].
const TOOL_CANDIDATES: &[&str] = &["yt-dlp", "youtube-dl"];

const ARIA2C: &str = "aria2c";

/// Accepted aria2c `-k` values, e.g. `20M` or `512K`.
#[allow(clippy::expect_used)]
static SPLIT_SIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+[KM]$").expect("split size regex is valid") // Static pattern, safe to panic
});

/// Which command-line dialect the located program speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    YtDlp,
    YoutubeDl,
}

impl Dialect {
    fn of(program: &Path) -> Self {
        let is_youtube_dl = program
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.starts_with("youtube-dl"));
        if is_youtube_dl {
            Self::YoutubeDl
        } else {
            Self::YtDlp
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ExternalDownloader {
    program: PathBuf,
    args: String,
}

/// Downloads through an external video tool.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: PathBuf,
    dialect: Dialect,
    proxy: Option<String>,
    user_agent: Option<String>,
    headers: Vec<(String, String)>,
    cookies_file: Option<PathBuf>,
    downloader: Option<ExternalDownloader>,
}

impl ExternalTool {
    /// Finds `yt-dlp`, falling back to `youtube-dl`, on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ToolNotFound`] if neither is installed.
    pub fn locate() -> Result<Self, DownloadError> {
        for candidate in TOOL_CANDIDATES {
            if let Ok(path) = which::which(candidate) {
                debug!(tool = %path.display(), "located external tool");
                return Ok(Self::with_program(path));
            }
        }

        Err(DownloadError::ToolNotFound {
            tool: TOOL_CANDIDATES.join(", "),
        })
    }

    /// Uses an explicit program path.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        Self {
            dialect: Dialect::of(&program),
            program,
            proxy: None,
            user_agent: None,
            headers: Vec::new(),
            cookies_file: None,
            downloader: None,
        }
    }

    /// Propagates proxy, User-Agent and extra headers from HTTP client options.
    #[must_use]
    pub fn with_client_options(mut self, options: &ClientOptions) -> Self {
        self.proxy.clone_from(&options.proxy);
        self.user_agent.clone_from(&options.user_agent);
        self.headers.extend(options.headers.iter().cloned());
        self
    }

    /// Passes a Netscape-format cookies file to the tool.
    #[must_use]
    pub fn with_cookies_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_file = Some(path.into());
        self
    }

    /// Uses `aria2c` with `threads` connections and a minimum split size.
    ///
    /// `split_size` must look like `20M` or `512K`; anything else falls back
    /// to `20M`. Does nothing if `aria2c` is not installed.
    #[must_use]
    pub fn with_aria2c(self, threads: u32, split_size: &str) -> Self {
        let split_size = if is_valid_split_size(split_size) {
            split_size
        } else {
            warn!(split_size, "invalid aria2c split size, using {DEFAULT_ARIA2C_SPLIT_SIZE}");
            DEFAULT_ARIA2C_SPLIT_SIZE
        };
        self.with_aria2c_args(format!("-x {threads} -k {split_size}"))
    }

    /// Uses `aria2c` with caller-supplied arguments. Does nothing if `aria2c`
    /// is not installed.
    #[must_use]
    pub fn with_aria2c_args(self, args: impl Into<String>) -> Self {
        match which::which(ARIA2C) {
            Ok(program) => self.with_external_downloader(program, args),
            Err(_) => {
                warn!("aria2c not found on PATH, using the built-in downloader");
                self
            }
        }
    }

    fn with_external_downloader(mut self, program: impl Into<PathBuf>, args: impl Into<String>) -> Self {
        self.downloader = Some(ExternalDownloader {
            program: program.into(),
            args: args.into(),
        });
        self
    }

    /// The program this strategy runs.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map_or_else(|| self.program.display().to_string(), |name| name.to_string_lossy().into_owned())
    }

    /// Arguments shared by every invocation.
    fn common_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--ignore-config".into(), "--no-playlist".into()];
        if let Some(proxy) = &self.proxy {
            args.push("--proxy".into());
            args.push(proxy.into());
        }
        if let Some(user_agent) = &self.user_agent {
            args.push("--user-agent".into());
            args.push(user_agent.into());
        }
        for (name, value) in &self.headers {
            args.push("--add-header".into());
            args.push(format!("{name}:{value}").into());
        }
        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.into());
        }
        args
    }

    fn filename_args(&self, url: &Url) -> Vec<OsString> {
        let mut args = self.common_args();
        args.extend([
            "--ignore-errors".into(),
            "--get-filename".into(),
            "--skip-download".into(),
            "-o".into(),
            TOOL_FILENAME_TEMPLATE.into(),
            url.as_str().into(),
        ]);
        args
    }

    fn download_args(&self, target: &DownloadTarget) -> Vec<OsString> {
        let mut args = self.common_args();

        // The output name is a template: literal percent signs must be doubled.
        let output = target
            .download_dir()
            .join(target.save_filename().replace('%', "%%"));
        args.push("-o".into());
        args.push(output.into_os_string());

        if self.dialect == Dialect::YtDlp {
            args.extend([
                "--no-simulate".into(),
                "--print".into(),
                "after_move:filepath".into(),
            ]);
        }
        if let Some(downloader) = &self.downloader {
            args.push("--external-downloader".into());
            args.push(downloader.program.clone().into_os_string());
            args.push("--external-downloader-args".into());
            args.push(downloader.args.clone().into());
        }
        args.push(target.url().as_str().into());
        args
    }

    async fn run(&self, args: &[OsString]) -> Result<Output, DownloadError> {
        debug!(tool = %self.program.display(), ?args, "running external tool");
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DownloadError::tool_failed(self.tool_name(), e.to_string()))
    }
}

fn is_valid_split_size(split_size: &str) -> bool {
    SPLIT_SIZE_PATTERN.is_match(split_size)
}

/// Last non-empty line of a process stream.
fn last_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
}

/// `<dir>/<stem>.info.json` next to a produced file.
fn info_json_path(produced: &Path) -> PathBuf {
    produced.with_extension("info.json")
}

#[async_trait]
impl TransferStrategy for ExternalTool {
    fn name(&self) -> &'static str {
        "external-tool"
    }

    async fn suggest_filename(&self, url: &Url) -> Option<String> {
        let output = match self.run(&self.filename_args(url)).await {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "filename lookup failed");
                return None;
            }
        };
        if !output.status.success() {
            debug!(status = %output.status, "filename lookup exited unsuccessfully");
            return None;
        }

        let line = last_line(&output.stdout)?;
        Path::new(&line)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
    }

    fn lock_path(&self, target: &DownloadTarget) -> PathBuf {
        target.lock_file_path()
    }

    fn removes_lock_file(&self) -> bool {
        true
    }

    async fn probe(&self, _target: &DownloadTarget) -> Probe {
        Probe::unknown()
    }

    async fn transfer(
        &self,
        target: &DownloadTarget,
        _plan: ResumePlan,
        _lock: &TransferLock,
    ) -> Result<TransferReport, DownloadError> {
        let output = self.run(&self.download_args(target)).await?;

        let reported = last_line(&output.stdout)
            .map(PathBuf::from)
            .filter(|path| path.is_file());
        let produced = reported.unwrap_or_else(|| target.save_file_path());

        let info_json = info_json_path(&produced);
        if tokio::fs::remove_file(&info_json).await.is_ok() {
            debug!(path = %info_json.display(), "removed metadata sidecar");
        }

        if !output.status.success() {
            let message = last_line(&output.stderr)
                .unwrap_or_else(|| format!("exited with {}", output.status));
            return Err(DownloadError::tool_failed(self.tool_name(), message));
        }

        let bytes_written = local_size(&produced).await.unwrap_or(0);
        info!(bytes = bytes_written, path = %produced.display(), "external transfer finished");

        Ok(TransferReport {
            staged_path: produced,
            bytes_written,
            resumed: false,
        })
    }

    async fn finalize(
        &self,
        target: &DownloadTarget,
        report: TransferReport,
    ) -> Result<PathBuf, DownloadError> {
        let produced = report.staged_path;
        let basename = produced
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !produced.is_file() || basename != target.save_filename() {
            return Err(DownloadError::UnexpectedOutput {
                expected: target.save_filename().to_string(),
                actual: produced.display().to_string(),
            });
        }
        Ok(produced)
    }
}
