mod support;

use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parfetch::{
    ConfigError, DownloadConfig, DownloadError, Downloader, KIB, RequestDescriptor, SingleReason,
    Strategy,
};
use reqwest::StatusCode;
use support::{TestServer, payload};
use tempfile::TempDir;

const PAYLOAD_LEN: usize = 64 * 1024 + 123;

fn parallel_config() -> DownloadConfig {
    DownloadConfig::new()
        .with_buffer_size(4 * KIB)
        .with_multi_thread(4, 16 * KIB)
}

fn downloader(
    server: &TestServer,
    route: &str,
    dir: &TempDir,
    config: DownloadConfig,
) -> Downloader {
    let request = RequestDescriptor::get(&server.url(route)).unwrap();
    Downloader::new(request, dir.path().join("out.bin"), config).unwrap()
}

#[test]
fn parallel_and_single_stream_write_the_same_bytes() {
    let data = payload(PAYLOAD_LEN);
    let server = TestServer::start(data.clone());
    let dir = TempDir::new().unwrap();

    let parallel = downloader(&server, "/file", &dir, parallel_config())
        .run()
        .expect("parallel download failed");
    assert_eq!(parallel.strategy, Strategy::Multi);
    assert_eq!(parallel.chunk_count, 4);
    assert_eq!(parallel.bytes_written, PAYLOAD_LEN as u64);
    assert_eq!(server.ranged_requests(), 4);
    let parallel_bytes = fs::read(&parallel.path).unwrap();

    let request = RequestDescriptor::get(&server.url("/plain")).unwrap();
    let single = Downloader::new(request, dir.path().join("plain.bin"), parallel_config())
        .unwrap()
        .run()
        .expect("single download failed");
    assert_eq!(
        single.strategy,
        Strategy::Single(SingleReason::RangesUnsupported)
    );
    assert_eq!(single.chunk_count, 0);
    let single_bytes = fs::read(&single.path).unwrap();

    assert_eq!(parallel_bytes, data);
    assert_eq!(single_bytes, data);
}

#[test]
fn resource_smaller_than_buffer_uses_one_stream() {
    let server = TestServer::start(payload(1000));
    let dir = TempDir::new().unwrap();

    let report = downloader(&server, "/file", &dir, DownloadConfig::new())
        .run()
        .unwrap();

    assert_eq!(report.strategy, Strategy::Single(SingleReason::TooSmall));
    assert_eq!(server.ranged_requests(), 0);
    assert_eq!(fs::read(&report.path).unwrap(), payload(1000));
}

#[test]
fn failing_chunk_is_reported_and_cancels_the_rest() {
    let server = TestServer::start(payload(PAYLOAD_LEN));
    let dir = TempDir::new().unwrap();
    let config = parallel_config().with_buffer_size(KIB);

    let downloader = downloader(&server, "/flaky", &dir, config);
    let token = downloader.cancel_token();
    let err = downloader.run().unwrap_err();

    match err {
        DownloadError::BadStatus { status, body } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "chunk rejected");
        }
        other => panic!("expected BadStatus, got {other:?}"),
    }
    assert!(token.is_cancelled());
    assert!(!token.deadline_elapsed());
}

#[test]
fn progress_never_goes_backwards_and_ends_at_total() {
    let server = TestServer::start(payload(PAYLOAD_LEN));
    let dir = TempDir::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    let report = downloader(&server, "/file", &dir, parallel_config())
        .on_progress(move |done, total| sink.lock().unwrap().push((done, total)))
        .run()
        .unwrap();

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    assert!(
        seen.iter()
            .all(|(_, total)| *total == Some(PAYLOAD_LEN as u64))
    );
    assert_eq!(seen.last().unwrap().0, report.bytes_written);
}

#[test]
fn slow_parallel_download_hits_the_deadline() {
    let server = TestServer::start(payload(PAYLOAD_LEN));
    let dir = TempDir::new().unwrap();
    let config = parallel_config()
        .with_buffer_size(KIB)
        .with_timeout(Duration::from_millis(300));

    let downloader = downloader(&server, "/slow", &dir, config);
    let token = downloader.cancel_token();
    let err = downloader.run().unwrap_err();

    assert!(
        matches!(err, DownloadError::DeadlineExceeded { timeout } if timeout == Duration::from_millis(300)),
        "expected DeadlineExceeded, got {err:?}"
    );
    assert!(err.is_timeout());
    assert!(token.deadline_elapsed());
}

#[test]
fn unknown_size_is_streamed_until_the_end() {
    let data = payload(PAYLOAD_LEN);
    let server = TestServer::start(data.clone());
    let dir = TempDir::new().unwrap();
    let totals = Arc::new(Mutex::new(Vec::new()));

    let sink = totals.clone();
    let report = downloader(&server, "/nolength", &dir, parallel_config())
        .on_progress(move |_, total| sink.lock().unwrap().push(total))
        .run()
        .unwrap();

    assert_eq!(
        report.strategy,
        Strategy::Single(SingleReason::ProbeUnavailable)
    );
    assert_eq!(report.bytes_written, PAYLOAD_LEN as u64);
    assert_eq!(fs::read(&report.path).unwrap(), data);
    assert!(totals.lock().unwrap().iter().all(Option::is_none));
}

#[test]
fn missing_resource_reports_status_and_body_without_creating_the_file() {
    let server = TestServer::start(payload(16));
    let dir = TempDir::new().unwrap();

    let err = downloader(&server, "/missing", &dir, DownloadConfig::new())
        .run()
        .unwrap_err();

    match err {
        DownloadError::BadStatus { status, body } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, "no such file");
        }
        other => panic!("expected BadStatus, got {other:?}"),
    }
    assert!(!dir.path().join("out.bin").exists());
}

#[test]
fn missing_parent_directories_are_created() {
    let server = TestServer::start(payload(PAYLOAD_LEN));
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("a").join("b").join("c").join("out.bin");

    let request = RequestDescriptor::get(&server.url("/file")).unwrap();
    let report = Downloader::new(request, &target, parallel_config())
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.path, target);
    assert_eq!(fs::read(&target).unwrap(), payload(PAYLOAD_LEN));
}

#[test]
fn existing_longer_file_is_truncated() {
    let server = TestServer::start(payload(PAYLOAD_LEN));
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("out.bin");
    fs::write(&target, vec![0xAA; PAYLOAD_LEN * 3]).unwrap();

    downloader(&server, "/file", &dir, parallel_config())
        .run()
        .unwrap();

    assert_eq!(fs::metadata(&target).unwrap().len(), PAYLOAD_LEN as u64);
    assert_eq!(fs::read(&target).unwrap(), payload(PAYLOAD_LEN));
}

#[test]
fn cancelled_before_start_leaves_existing_file_alone() {
    let server = TestServer::start(payload(PAYLOAD_LEN));
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("out.bin");
    fs::write(&target, b"keep me").unwrap();

    let downloader = downloader(&server, "/file", &dir, parallel_config());
    downloader.cancel_token().cancel();
    let err = downloader.run().unwrap_err();

    assert!(matches!(err, DownloadError::Cancelled), "got {err:?}");
    assert_eq!(server.ranged_requests(), 0);
    assert_eq!(fs::read(&target).unwrap(), b"keep me");
}

#[test]
fn chunk_ending_early_is_incomplete() {
    let server = TestServer::start(payload(PAYLOAD_LEN));
    let dir = TempDir::new().unwrap();

    let err = downloader(&server, "/short", &dir, parallel_config())
        .run()
        .unwrap_err();

    match err {
        DownloadError::Incomplete { expected, received } => {
            assert_eq!(expected - received, 10);
        }
        other => panic!("expected Incomplete, got {other:?}"),
    }
}

#[test]
fn single_stream_shorter_than_declared_is_incomplete() {
    let server = TestServer::start(payload(PAYLOAD_LEN));
    let dir = TempDir::new().unwrap();

    let err = downloader(&server, "/truncated", &dir, parallel_config())
        .run()
        .unwrap_err();

    match err {
        DownloadError::Incomplete { expected, received } => {
            assert_eq!(expected, PAYLOAD_LEN as u64);
            assert_eq!(received, PAYLOAD_LEN as u64 - 10);
        }
        other => panic!("expected Incomplete, got {other:?}"),
    }
}

#[test]
fn full_body_answer_to_a_range_is_rejected() {
    let server = TestServer::start(payload(PAYLOAD_LEN));
    let dir = TempDir::new().unwrap();

    let err = downloader(&server, "/ignores", &dir, parallel_config())
        .run()
        .unwrap_err();

    match err {
        DownloadError::RangeNotHonored { requested } => assert!(requested > 0),
        other => panic!("expected RangeNotHonored, got {other:?}"),
    }
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = TempDir::new().unwrap();
    let request = RequestDescriptor::get(&format!("http://127.0.0.1:{port}/file")).unwrap();

    let err = Downloader::new(request, dir.path().join("out.bin"), DownloadConfig::new())
        .unwrap()
        .run()
        .unwrap_err();

    assert!(
        matches!(err, DownloadError::Transport { .. }),
        "expected Transport, got {err:?}"
    );
    assert!(!err.is_timeout());
    assert!(!dir.path().join("out.bin").exists());
}

#[test]
fn empty_save_path_fails_before_any_request() {
    let server = TestServer::start(payload(16));
    let request = RequestDescriptor::get(&server.url("/file")).unwrap();

    let err = Downloader::new(request, "", DownloadConfig::new()).err();

    assert!(matches!(err, Some(ConfigError::NoSavePath)));
}

#[test]
fn convenience_function_downloads_with_get() {
    let server = TestServer::start(payload(PAYLOAD_LEN));
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("quick.bin");

    let report = parfetch::download(&server.url("/file"), &target, parallel_config()).unwrap();

    assert_eq!(report.strategy, Strategy::Multi);
    assert_eq!(fs::read(&target).unwrap(), payload(PAYLOAD_LEN));
}
