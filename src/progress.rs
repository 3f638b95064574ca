//! Progress UI (spinner) for a running download.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::download::{local_size, percentage};

/// Spawns the progress UI (spinner) when requested.
///
/// The spinner polls the size of `watched` (the partial file) and, when
/// `total` is known, shows a percentage. Returns (handle, stop) so the caller
/// can signal stop and await the handle. When `use_spinner` is false, returns
/// (None, stop) with stop already true.
#[must_use]
pub fn spawn_progress_ui(
    use_spinner: bool,
    label: String,
    watched: PathBuf,
    total: Option<u64>,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(label, watched, total, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(
    label: String,
    watched: PathBuf,
    total: Option<u64>,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            let current = local_size(&watched).await;
            spinner.set_message(progress_message(&label, current, total));
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        spinner.finish_and_clear();
    })
}

/// One status line, e.g. `Downloading movie.mp4... 400 / 1000 bytes (40.00%)`.
fn progress_message(label: &str, current: Option<u64>, total: Option<u64>) -> String {
    let bytes = current.unwrap_or(0);
    match total {
        Some(total) if total > 0 => format!(
            "Downloading {label}... {bytes} / {total} bytes ({:.2}%)",
            percentage(current, Some(total))
        ),
        _ => format!("Downloading {label}... {bytes} bytes"),
    }
}
