//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use resumer_core::download::constants::DEFAULT_ARIA2C_ARGS;
use resumer_core::{ClientOptions, DownloadTarget, TargetBuilder};

/// Resumable single-file downloads.
///
/// Interrupted downloads continue from where they stopped; a file only
/// appears under its final name once it is complete.
#[derive(Parser, Debug)]
#[command(name = "resumer")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a file over HTTP(S)
    File(RequestArgs),
    /// Download a video through yt-dlp
    Video(VideoArgs),
    /// Show whether a file is complete and how far along it is
    Status(RequestArgs),
}

/// Where a download comes from and where it goes.
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// URL to download
    pub url: String,

    /// Save path template, e.g. "%(dir)/%(name)-v2.%(ext)"
    #[arg(long)]
    pub save_as: Option<String>,

    /// Proxy URL (http, https or socks5)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Download directory (defaults to the current directory)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

impl TargetArgs {
    pub fn target_builder(&self) -> TargetBuilder {
        let mut builder = DownloadTarget::builder(self.url.as_str());
        if let Some(dir) = &self.dir {
            builder = builder.download_dir(dir);
        }
        if let Some(template) = &self.save_as {
            builder = builder.save_as(template.as_str());
        }
        builder
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct RequestArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// User-Agent header to send
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Extra request header, "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

impl RequestArgs {
    pub fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::default();
        if let Some(proxy) = &self.target.proxy {
            options = options.with_proxy(proxy.as_str());
        }
        if let Some(user_agent) = &self.user_agent {
            options = options.with_user_agent(user_agent.as_str());
        }
        for (name, value) in &self.headers {
            options = options.with_header(name.as_str(), value.as_str());
        }
        options
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct VideoArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Use aria2c as the external downloader when it is installed
    #[arg(long)]
    pub with_aria2c: bool,

    /// Arguments passed to aria2c
    #[arg(long, default_value = DEFAULT_ARIA2C_ARGS, allow_hyphen_values = true)]
    pub aria2c_args: String,

    /// Netscape-format cookies file
    #[arg(long)]
    pub cookies: Option<PathBuf>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got \"{raw}\""))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in \"{raw}\""));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
