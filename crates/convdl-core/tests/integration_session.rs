//! Integration test: a full session against a local backend, with the push
//! channel connected.

mod common;

use std::time::Duration;

use common::backend::{closed_url, Backend, BackendOptions};
use convdl_core::channel::ChannelOptions;
use convdl_core::dispatch::CurlDispatcher;
use convdl_core::error::ErrorKind;
use convdl_core::job::{JobState, MediaFormat};
use convdl_core::notice::Notice;
use convdl_core::progress::Progress;
use convdl_core::session::SessionBuilder;
use tempfile::tempdir;

const LINK: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

fn channel(url: &str) -> ChannelOptions {
    let mut opts = ChannelOptions::new(url, "/socket.io/");
    opts.connect_timeout = Duration::from_secs(2);
    opts.poll_timeout = Duration::from_secs(5);
    opts.reconnect_delay = Some(Duration::from_millis(200));
    opts
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn download_with_push_progress_writes_artifact() {
    let backend = Backend::start(BackendOptions {
        delay: Duration::from_millis(1500),
        progress: vec![0.2, 0.65],
        ..Default::default()
    });
    let dir = tempdir().unwrap();
    let handle = SessionBuilder::new(CurlDispatcher::new(&backend.url), dir.path())
        .progress_channel(Some(channel(&backend.url)))
        .spawn()
        .unwrap();
    assert!(backend.wait_connected(Duration::from_secs(5)), "push channel never joined");

    let mut status = handle.subscribe();
    let job = {
        let submitter = handle.submitter();
        tokio::spawn(async move { submitter.submit(LINK, MediaFormat::Mp3).await })
    };
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.state == JobState::Downloading && s.progress == Progress::Fraction(0.65)),
    )
    .await
    .expect("push progress should reach the snapshot")
    .unwrap();

    let report = job.await.unwrap().unwrap();
    let artifact = report.outcome.clone().unwrap();
    assert_eq!(artifact.path, dir.path().join("downloaded-file.mp3"));
    assert_eq!(
        std::fs::read(&artifact.path).unwrap(),
        BackendOptions::default().body
    );
    assert_eq!(Notice::for_report(&report).title, "Success");
    assert_eq!(backend.download_requests().len(), 1);
    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mp4_overwrites_previous_artifact() {
    let backend = Backend::start(BackendOptions {
        content_type: "video/mp4",
        body: b"second".to_vec(),
        ..Default::default()
    });
    let dir = tempdir().unwrap();
    let target = dir.path().join("downloaded-file.mp4");
    std::fs::write(&target, b"first run").unwrap();

    let handle = SessionBuilder::new(CurlDispatcher::new(&backend.url), dir.path())
        .spawn()
        .unwrap();
    let report = handle.submit(LINK, MediaFormat::Mp4).await.unwrap();
    assert!(report.is_success());
    assert_eq!(std::fs::read(&target).unwrap(), b"second");
    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_push_channel_does_not_affect_the_job() {
    let backend = Backend::start(BackendOptions::default());
    let dir = tempdir().unwrap();
    let handle = SessionBuilder::new(CurlDispatcher::new(&backend.url), dir.path())
        .progress_channel(Some(channel(&closed_url())))
        .spawn()
        .unwrap();

    let report = handle.submit(LINK, MediaFormat::Mp3).await.unwrap();
    assert!(report.is_success());
    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("shutdown should release the channel");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backend_failure_ends_in_server_error() {
    let backend = Backend::start(BackendOptions {
        status: 500,
        content_type: "application/json",
        body: br#"{"error":"yt-dlp exited with 1"}"#.to_vec(),
        ..Default::default()
    });
    let dir = tempdir().unwrap();
    let handle = SessionBuilder::new(CurlDispatcher::new(&backend.url), dir.path())
        .spawn()
        .unwrap();

    let report = handle.submit(LINK, MediaFormat::Mp3).await.unwrap();
    assert_eq!(report.state(), JobState::Error(ErrorKind::Server));
    assert!(!dir.path().join("downloaded-file.mp3").exists());
    assert_eq!(
        Notice::for_report(&report).message,
        "Failed to download file. Please try again."
    );
    handle.shutdown().await;
}
