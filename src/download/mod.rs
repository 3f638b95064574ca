//! Resumable single-file downloads.
//!
//! A [`DownloadTarget`] names the remote resource and where it lands on disk;
//! a [`Downloader`] moves the bytes with the [`TransferStrategy`] it was built
//! with.
//!
//! # Features
//!
//! - Resume from a `<final>.download` partial file via HTTP byte ranges
//! - Atomic rename on completion, so the final name only ever holds a whole file
//! - Non-blocking advisory locking against concurrent downloaders
//! - `%(dir)`/`%(filename)`/`%(name)`/`%(ext)` save-path templates
//! - Delegated transfers through `yt-dlp`, optionally with `aria2c`
//!
//! # Example
//!
//! ```no_run
//! use resumer_core::download::{ClientOptions, DownloadTarget, Downloader, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::from_options(&ClientOptions::default().with_proxy("http://127.0.0.1:8080"))?;
//! let downloader = Downloader::direct(client);
//! let target = DownloadTarget::builder("https://example.com/movie.mp4")
//!     .download_dir("./downloads")
//!     .save_as("%(dir)/%(name)-v2.%(ext)")
//!     .build()?;
//! downloader.download(&target).await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
mod lock;
mod probe;
pub mod strategy;
mod target;

pub use client::{ClientOptions, HttpClient};
pub use engine::{DownloadOutcome, Downloader};
pub use error::{DownloadError, ErrorCategory};
pub use lock::TransferLock;
pub use probe::{Probe, ResumePlan, local_size, percentage, plan_resume};
pub use strategy::{DirectHttp, ExternalTool, TransferReport, TransferStrategy};
pub use target::{
    DIR_PLACEHOLDER, DownloadTarget, EXT_PLACEHOLDER, FILENAME_PLACEHOLDER, NAME_PLACEHOLDER,
    TargetBuilder, apply_path_template, default_download_dir, ensure_writable_directory,
    resolve_save_filename,
};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
