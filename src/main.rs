//! CLI entry point for the resumer tool.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use resumer_core::progress::spawn_progress_ui;
use resumer_core::{DownloadOutcome, Downloader, ExternalTool, HttpClient};
use tracing::{debug, error, info};

mod cli;

use cli::{Args, Command, RequestArgs, VideoArgs};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match args.command {
        Command::File(request) => {
            let use_spinner = !args.quiet && io::stderr().is_terminal();
            report(download_file(&request, use_spinner).await)
        }
        Command::Video(video) => report(download_video(&video).await),
        Command::Status(request) => match status(&request).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

/// Prints the status line and maps the result to an exit code.
fn report(result: Result<DownloadOutcome>) -> ExitCode {
    match result {
        Ok(outcome) => {
            info!(path = %outcome.path().display(), "saved");
            println!("Downloading... -- successful");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            println!("Downloading... -- failed");
            ExitCode::FAILURE
        }
    }
}

async fn download_file(request: &RequestArgs, use_spinner: bool) -> Result<DownloadOutcome> {
    let client = HttpClient::from_options(&request.client_options())?;
    let downloader = Downloader::direct(client);
    let target = downloader
        .resolve_target(request.target.target_builder())
        .await?;

    let total = downloader.probe_remote_size(&target).await;
    let (handle, stop) = spawn_progress_ui(
        use_spinner,
        target.save_filename().to_string(),
        target.temp_file_path(),
        total,
    );

    let result = downloader.download(&target).await;

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = handle {
        let _ = handle.await;
    }

    result.with_context(|| format!("downloading {}", target.url()))
}

async fn download_video(video: &VideoArgs) -> Result<DownloadOutcome> {
    let mut tool = ExternalTool::locate()?.with_client_options(&video.request.client_options());
    if let Some(cookies) = &video.cookies {
        tool = tool.with_cookies_file(cookies);
    }
    if video.with_aria2c {
        tool = tool.with_aria2c_args(video.aria2c_args.as_str());
    }

    let downloader = Downloader::external(tool);
    let target = downloader
        .resolve_target(video.request.target.target_builder())
        .await?;

    downloader
        .download(&target)
        .await
        .with_context(|| format!("downloading {}", target.url()))
}

async fn status(request: &RequestArgs) -> Result<()> {
    let downloader = Downloader::direct(HttpClient::from_options(&request.client_options())?);
    let target = downloader
        .resolve_target(request.target.target_builder())
        .await?;

    let finished = downloader.is_finished(&target).await;
    let percent = downloader.progress_percentage(&target).await;

    println!("file: {}", target.save_file_path().display());
    println!("finished: {finished}");
    println!("progress: {percent:.2}%");
    Ok(())
}
