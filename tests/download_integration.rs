//! Integration tests for the download module.
//!
//! These tests verify the full download flow with mock HTTP servers.

use std::time::Duration;

use resumer_core::download::{
    DownloadError, DownloadOutcome, DownloadTarget, Downloader, ErrorCategory, HttpClient,
    ResumePlan,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// A 1000-byte body with a recognisable pattern.
fn body() -> Vec<u8> {
    (0..1000_u32).map(|i| (i % 251) as u8).collect()
}

async fn mount_head(server: &MockServer, len: usize) {
    Mock::given(method("HEAD"))
        .and(path("/movie.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Accept-Ranges", "bytes")
                .insert_header("Content-Length", len.to_string()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_interrupted_download_resumes_to_exact_bytes() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let content = body();
    mount_head(&server, content.len()).await;
    Mock::given(method("GET"))
        .and(path("/movie.mp4"))
        .and(header("Range", "bytes=400-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(content[400..].to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let downloader = Downloader::direct(HttpClient::new());
    let target = DownloadTarget::builder(format!("{}/movie.mp4", server.uri()))
        .download_dir(temp_dir.path())
        .build()
        .expect("target should resolve");

    // Simulate an earlier run that was killed after 400 bytes.
    std::fs::write(target.temp_file_path(), &content[..400]).expect("write partial");
    assert!(!downloader.is_finished(&target).await);
    assert_eq!(downloader.prepare_resume(&target).await, ResumePlan::From(400));

    let outcome = downloader.download(&target).await.expect("download should succeed");
    assert!(matches!(
        outcome,
        DownloadOutcome::Completed {
            bytes_written: 600,
            resumed: true,
            ..
        }
    ));

    let saved = std::fs::read(target.save_file_path()).expect("read final file");
    assert_eq!(saved, content);
    assert!(!target.temp_file_path().exists());
    assert!(downloader.is_finished(&target).await);
}

#[tokio::test]
async fn test_save_as_template_controls_final_path() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let content = body();
    mount_head(&server, content.len()).await;
    Mock::given(method("GET"))
        .and(path("/movie.mp4"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(content.clone()))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let downloader = Downloader::direct(HttpClient::new());
    let target = DownloadTarget::builder(format!("{}/movie.mp4", server.uri()))
        .download_dir(temp_dir.path())
        .save_as("%(dir)/clips/%(name)-v2.%(ext)")
        .build()
        .expect("target should resolve");

    assert_eq!(target.download_dir(), temp_dir.path().join("clips"));
    assert_eq!(target.save_filename(), "movie-v2.mp4");
    assert!(target.download_dir().is_dir(), "template directory is created eagerly");

    downloader.download(&target).await.expect("download should succeed");
    let saved = std::fs::read(temp_dir.path().join("clips/movie-v2.mp4")).expect("read final file");
    assert_eq!(saved, content);
}

#[tokio::test]
async fn test_concurrent_downloads_only_one_transfers() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let content = body();
    mount_head(&server, content.len()).await;
    Mock::given(method("GET"))
        .and(path("/movie.mp4"))
        .respond_with(
            ResponseTemplate::new(206)
                .set_body_bytes(content.clone())
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let target = DownloadTarget::builder(format!("{}/movie.mp4", server.uri()))
        .download_dir(temp_dir.path())
        .build()
        .expect("target should resolve");
    let first = Downloader::direct(HttpClient::new());
    let second = Downloader::direct(HttpClient::new());

    let (a, b) = tokio::join!(first.download(&target), second.download(&target));
    let results = [a, b];

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let locked = results
        .iter()
        .filter(|r| matches!(r, Err(DownloadError::Locked { .. })))
        .count();
    assert_eq!(succeeded, 1, "exactly one download should win: {results:?}");
    assert_eq!(locked, 1, "the other should fail fast with Locked: {results:?}");

    let loser = results.iter().find_map(|r| r.as_ref().err()).expect("one error");
    assert_eq!(loser.category(), ErrorCategory::Concurrency);
    assert_eq!(std::fs::read(target.save_file_path()).expect("read final file"), content);
}

#[tokio::test]
async fn test_interrupted_stream_keeps_partial_for_next_run() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let content = body();
    mount_head(&server, content.len()).await;
    Mock::given(method("GET"))
        .and(path("/movie.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let downloader = Downloader::direct(HttpClient::new());
    let target = DownloadTarget::builder(format!("{}/movie.mp4", server.uri()))
        .download_dir(temp_dir.path())
        .build()
        .expect("target should resolve");
    std::fs::write(target.temp_file_path(), &content[..250]).expect("write partial");

    let first = downloader.download(&target).await;
    assert!(
        matches!(first, Err(DownloadError::HttpStatus { status: 404, .. })),
        "expected HTTP 404, got {first:?}"
    );
    assert_eq!(
        std::fs::read(target.temp_file_path()).expect("partial kept"),
        &content[..250]
    );
    assert!((downloader.progress_percentage(&target).await - 25.0).abs() < 1e-9);

    Mock::given(method("GET"))
        .and(path("/movie.mp4"))
        .and(header("Range", "bytes=250-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(content[250..].to_vec()))
        .mount(&server)
        .await;

    downloader.download(&target).await.expect("retry should succeed");
    assert_eq!(std::fs::read(target.save_file_path()).expect("read final file"), content);
}

#[tokio::test]
async fn test_unwritable_directory_fails_before_any_request() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let blocker = temp_dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").expect("write blocker");

    let result = DownloadTarget::builder("https://example.com/movie.mp4")
        .download_dir(blocker.join("nested"))
        .build();

    let err = result.expect_err("directory under a regular file cannot be created");
    assert!(matches!(err, DownloadError::Filesystem { .. }));
    assert_eq!(err.category(), ErrorCategory::Filesystem);
}

#[cfg(unix)]
mod external_tool {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use resumer_core::download::{DownloadError, DownloadTarget, Downloader, ExternalTool};
    use tempfile::TempDir;

    /// A stand-in for yt-dlp: prints a suggested name for `--get-filename`,
    /// otherwise writes the `-o` path plus an `.info.json` sidecar and prints
    /// the produced path.
    const FAKE_TOOL: &str = r#"#!/bin/sh
out=""
mode="download"
while [ $# -gt 0 ]; do
  case "$1" in
    --get-filename) mode="name" ;;
    -o) shift; out="$1" ;;
  esac
  shift
done
if [ "$mode" = "name" ]; then
  echo "Some Title-abc123.mp4"
  exit 0
fi
printf 'video-bytes' > "$out"
printf '{}' > "${out%.*}.info.json"
echo "$out"
"#;

    fn install_fake_tool(dir: &Path) -> PathBuf {
        let program = dir.join("yt-dlp");
        std::fs::write(&program, FAKE_TOOL).expect("write fake tool");
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake tool");
        program
    }

    #[tokio::test]
    async fn test_external_tool_downloads_with_suggested_name() {
        let bin_dir = TempDir::new().expect("failed to create temp dir");
        let out_dir = TempDir::new().expect("failed to create temp dir");
        let downloader = Downloader::external(ExternalTool::with_program(install_fake_tool(
            bin_dir.path(),
        )));

        let target = downloader
            .resolve_target(
                DownloadTarget::builder("https://videos.example.com/watch?v=abc123")
                    .download_dir(out_dir.path()),
            )
            .await
            .expect("target should resolve");
        assert_eq!(target.save_filename(), "Some Title-abc123.mp4");

        let outcome = downloader.download(&target).await.expect("download should succeed");
        assert_eq!(outcome.path(), target.save_file_path());
        assert_eq!(
            std::fs::read(target.save_file_path()).expect("read video"),
            b"video-bytes"
        );
        assert!(!out_dir.path().join("Some Title-abc123.info.json").exists());
        assert!(!target.lock_file_path().exists());
    }

    #[tokio::test]
    async fn test_external_tool_failure_is_reported() {
        let bin_dir = TempDir::new().expect("failed to create temp dir");
        let out_dir = TempDir::new().expect("failed to create temp dir");
        let program = bin_dir.path().join("yt-dlp");
        std::fs::write(&program, "#!/bin/sh\necho 'ERROR: unsupported URL' >&2\nexit 1\n")
            .expect("write fake tool");
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake tool");

        let downloader = Downloader::external(ExternalTool::with_program(program));
        let target = downloader
            .resolve_target(
                DownloadTarget::builder("https://videos.example.com/watch?v=abc123")
                    .download_dir(out_dir.path()),
            )
            .await
            .expect("target should resolve");
        // Suggestion failed, so the URL-derived name is used.
        assert_eq!(target.save_filename(), "watch");

        let result = downloader.download(&target).await;
        match result {
            Err(DownloadError::ToolFailed { message, .. }) => {
                assert!(message.contains("unsupported URL"), "message: {message}");
            }
            other => panic!("expected ToolFailed, got {other:?}"),
        }
        assert!(!target.lock_file_path().exists());
    }
}
