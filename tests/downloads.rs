use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{self, StreamExt};
use model_linker::download_manager::{
    Credentials,
    DownloadJob,
    DownloadManager,
    DownloadRequest,
    DownloadStatus,
};
use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use tokio::net::TcpListener;

const CHUNK: usize = 1024 * 1024;
const CHUNKS: usize = 10;

/// 10 MB in 1 MB chunks, one every 50 ms, with a content-length header.
async fn paced_model() -> Response {
    let body = stream::iter(0..CHUNKS).then(|i| async move {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok::<_, Infallible>(vec![b'm'; CHUNK])
    });
    (
        [(header::CONTENT_LENGTH, (CHUNK * CHUNKS).to_string())],
        Body::from_stream(body),
    )
        .into_response()
}

/// Sends the first KiB of a 2 KiB file, then goes silent.
async fn stalled_model() -> Response {
    let body = stream::iter(0..2).then(|i| async move {
        if i > 0 {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok::<_, Infallible>(vec![b's'; 1024])
    });
    ([(header::CONTENT_LENGTH, "2048")], Body::from_stream(body)).into_response()
}

async fn small_model() -> &'static str {
    "tiny model weights"
}

async fn gone() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/files/big.safetensors", get(paced_model))
        .route("/files/small.safetensors", get(small_model))
        .route("/files/stalled.safetensors", get(stalled_model))
        .route("/files/gone.safetensors", get(gone));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn request(base: &str, file: &str, target_dir: &Path) -> DownloadRequest {
    DownloadRequest {
        url: format!("{}/files/{}", base, file),
        category: "checkpoints".into(),
        target_dir: target_dir.to_path_buf(),
        ..DownloadRequest::default()
    }
}

async fn wait_until<F>(manager: &DownloadManager, id: &str, done: F) -> DownloadJob
where
    F: Fn(&DownloadJob) -> bool,
{
    for _ in 0..1000 {
        if let Some(job) = manager.get_progress(id) {
            if done(&job) {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("download {} did not reach the expected state", id);
}

#[tokio::test]
async fn cancel_midway_removes_the_partial_file() {
    let base = spawn_server().await;
    let dir = tempdir().unwrap();
    let manager = DownloadManager::new(Credentials::default()).unwrap();

    let started = manager.start_download(request(&base, "big.safetensors", dir.path())).unwrap();
    let running = wait_until(&manager, &started.id, |job| job.downloaded >= 3 * CHUNK as u64).await;
    assert_eq!(running.status, DownloadStatus::Downloading);
    assert_eq!(running.total_size, (CHUNK * CHUNKS) as u64);
    assert!(running.progress.unwrap() < 100.0);

    assert!(manager.cancel(&started.id));
    let job = wait_until(&manager, &started.id, |job| job.status.is_terminal()).await;

    assert_eq!(job.status, DownloadStatus::Cancelled);
    assert!(job.downloaded < (CHUNK * CHUNKS) as u64);
    assert!(!started.dest_path.exists());
}

#[tokio::test]
async fn cancel_reaches_a_stream_that_stopped_sending() {
    let base = spawn_server().await;
    let dir = tempdir().unwrap();
    let manager = DownloadManager::new(Credentials::default()).unwrap();

    let started = manager.start_download(request(&base, "stalled.safetensors", dir.path())).unwrap();
    let running = wait_until(&manager, &started.id, |job| job.downloaded >= 1024).await;
    assert_eq!(running.status, DownloadStatus::Downloading);
    assert_eq!(running.total_size, 2048);
    assert!(started.dest_path.exists());

    assert!(manager.cancel(&started.id));
    let job = wait_until(&manager, &started.id, |job| job.status.is_terminal()).await;

    assert_eq!(job.status, DownloadStatus::Cancelled);
    assert_eq!(job.downloaded, 1024);
    assert!(!started.dest_path.exists());
}

#[tokio::test]
async fn completed_download_reports_full_progress() {
    let base = spawn_server().await;
    let dir = tempdir().unwrap();
    let manager = DownloadManager::new(Credentials::default()).unwrap();

    let started = manager.start_download(request(&base, "small.safetensors", dir.path())).unwrap();
    let job = wait_until(&manager, &started.id, |job| job.status.is_terminal()).await;

    assert_eq!(job.status, DownloadStatus::Completed);
    assert_eq!(job.progress, Some(100.0));
    assert_eq!(job.total_size, job.downloaded);
    assert_eq!(job.speed, 0.0);
    assert_eq!(std::fs::read(&started.dest_path).unwrap(), b"tiny model weights");

    // Cancelling after completion changes nothing and keeps the file.
    assert!(!manager.cancel(&started.id));
    let after = manager.get_progress(&started.id).unwrap();
    assert_eq!(after.status, DownloadStatus::Completed);
    assert!(started.dest_path.exists());

    assert_eq!(manager.clear_finished(), 1);
    assert!(manager.get_progress(&started.id).is_none());
}

#[tokio::test]
async fn http_404_becomes_a_readable_error() {
    let base = spawn_server().await;
    let dir = tempdir().unwrap();
    let manager = DownloadManager::new(Credentials::default()).unwrap();

    let started = manager.start_download(request(&base, "gone.safetensors", dir.path())).unwrap();
    let job = wait_until(&manager, &started.id, |job| job.status.is_terminal()).await;

    assert_eq!(job.status, DownloadStatus::Error);
    assert!(job.error.unwrap().contains("File not found"));
    assert!(!started.dest_path.exists());
}

#[tokio::test]
async fn progress_never_goes_backwards() {
    let base = spawn_server().await;
    let dir = tempdir().unwrap();
    let manager = DownloadManager::new(Credentials::default()).unwrap();

    let started = manager.start_download(request(&base, "big.safetensors", dir.path())).unwrap();
    let mut last = 0;
    for _ in 0..500 {
        let job = manager.get_progress(&started.id).unwrap();
        assert!(job.downloaded >= last);
        assert!(job.speed >= 0.0);
        if job.total_size == 0 {
            assert!(job.progress.is_none());
        }
        last = job.downloaded;
        if job.status.is_terminal() {
            assert_eq!(job.status, DownloadStatus::Completed);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(manager.get_progress(&started.id).unwrap().status, DownloadStatus::Completed);
    assert_eq!(std::fs::metadata(&started.dest_path).unwrap().len(), (CHUNK * CHUNKS) as u64);
}
