mod common;

use announce_assets::{
    event_channel, http_client, DownloadError, DownloadEvent, DownloadTask, Downloader,
};
use common::{downloader, files_in, payload_for, spawn_server};
use std::time::{Duration, Instant};

fn task(base: &str, route: &str, name: &str, dir: &std::path::Path) -> DownloadTask {
    DownloadTask {
        filename: name.to_string(),
        url: format!("{base}/{route}/{name}"),
        destination: dir.join(name),
        size_label: "1KB".to_string(),
    }
}

#[tokio::test]
async fn fetch_streams_body_to_destination() {
    let server = spawn_server().await;
    let tmp = tempfile::tempdir().unwrap();
    let (tx, mut rx) = event_channel();
    let dl = downloader().with_events(tx);

    let t = task(&server.base, "files", "voice.onnx", tmp.path());
    let bytes = dl.fetch(&t).await.expect("download should succeed");

    let expected = payload_for("voice.onnx");
    assert_eq!(bytes, expected.len() as u64);
    assert_eq!(std::fs::read(&t.destination).unwrap(), expected);
    assert_eq!(files_in(tmp.path()), vec!["voice.onnx"]);

    drop(dl);
    let mut finished = false;
    while let Some(event) = rx.recv().await {
        if let DownloadEvent::Finished { filename, bytes, .. } = event {
            assert_eq!(filename, "voice.onnx");
            assert_eq!(bytes, expected.len() as u64);
            finished = true;
        }
    }
    assert!(finished, "a Finished event should be published");
}

#[tokio::test]
async fn non_success_status_is_an_error_and_leaves_nothing() {
    let server = spawn_server().await;
    let tmp = tempfile::tempdir().unwrap();

    let t = task(&server.base, "missing", "voice.onnx", tmp.path());
    match downloader().fetch(&t).await {
        Err(DownloadError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected HTTP status error, got {other:?}"),
    }
    assert!(!t.destination.exists());
    assert!(files_in(tmp.path()).is_empty());
}

#[tokio::test]
async fn interrupted_download_removes_partial_file() {
    let server = spawn_server().await;
    let tmp = tempfile::tempdir().unwrap();
    let t = task(&server.base, "broken", "voice.onnx", tmp.path());
    // A stale copy from an earlier install must not survive a failed refresh.
    std::fs::write(&t.destination, b"stale").unwrap();

    let (tx, mut rx) = event_channel();
    let result = downloader().with_events(tx).fetch(&t).await;

    assert!(result.is_err(), "interrupted body must fail");
    assert!(!t.destination.exists());
    assert!(files_in(tmp.path()).is_empty(), "no .part file may remain");

    let mut failed = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, DownloadEvent::Failed { .. }) {
            failed = true;
        }
    }
    assert!(failed, "a Failed event should be published");
}

#[tokio::test]
async fn destination_directory_is_created() {
    let server = spawn_server().await;
    let tmp = tempfile::tempdir().unwrap();
    let nested = tmp.path().join("a").join("b");

    let t = task(&server.base, "files", "cfg.onnx.json", &nested);
    downloader().fetch(&t).await.expect("download should succeed");
    assert!(t.destination.is_file());
}

#[tokio::test]
async fn stalled_body_hits_read_timeout() {
    let server = spawn_server().await;
    let tmp = tempfile::tempdir().unwrap();
    let t = task(&server.base, "stalled", "voice.onnx", tmp.path());

    let client = http_client(Duration::from_secs(5), Duration::from_millis(200)).unwrap();
    let started = Instant::now();
    let result = Downloader::new(client, Duration::from_millis(1)).fetch(&t).await;

    match result {
        Err(e @ DownloadError::Body { .. }) => assert!(e.is_retryable()),
        other => panic!("expected an interrupted body, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
    assert!(files_in(tmp.path()).is_empty());
}
