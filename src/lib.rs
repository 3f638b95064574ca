//! Resumer Core Library
//!
//! Resumable, lock-protected single-file downloads over HTTP(S), with an
//! optional hand-off to external video tools.
//!
//! # Architecture
//!
//! - [`download`] - target resolution, probing, locking, and the transfer engine
//! - [`progress`] - terminal progress display for running downloads

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod progress;
#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use download::{
    ClientOptions, DownloadError, DownloadOutcome, DownloadTarget, Downloader, ExternalTool,
    HttpClient, TargetBuilder,
};
