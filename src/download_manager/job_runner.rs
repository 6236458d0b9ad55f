// model-linker/src/download_manager/job_runner.rs

use futures_util::StreamExt;
use log::{debug, error, info, warn};
use reqwest::Client;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::job_types::{DownloadJob, DownloadStatus};
use super::progress_store::ProgressStore;
use super::request_auth::{describe_http_failure, AuthorizedRequest};
use super::speed_tracker::SpeedTracker;

/// Time allowed for the connection, the response headers, and each gap
/// between body chunks.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DELETE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Everything the background task needs to fetch one file.
pub struct DownloadTask {
    pub id: String,
    pub request: AuthorizedRequest,
    pub host: String,
    pub dest_path: PathBuf,
}

enum Outcome {
    Completed,
    Cancelled,
}

/// Deletes a partially written file. The handle must already be closed;
/// some platforms refuse to delete open files, so one retry follows.
pub async fn remove_partial_file(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(first) => {
            debug!("First delete of {} failed: {}. Retrying.", path.display(), first);
            tokio::time::sleep(DELETE_RETRY_DELAY).await;
            if let Err(e) = fs::remove_file(path).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Could not remove partial file {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Runs one job to a terminal state, recording everything in `store`.
pub async fn run_download(client: Client, store: ProgressStore, task: DownloadTask, cancel: CancellationToken) {
    let mut created_file = false;
    let result = fetch(&client, &store, &task, &cancel, &mut created_file).await;

    match result {
        Ok(Outcome::Completed) => {
            store.update(&task.id, DownloadJob::mark_completed);
            info!("Download {} completed: {}", task.id, task.dest_path.display());
        }
        Ok(Outcome::Cancelled) => {
            if created_file {
                remove_partial_file(&task.dest_path).await;
            }
            store.update(&task.id, DownloadJob::mark_cancelled);
            info!("Download {} cancelled", task.id);
        }
        Err(message) => {
            if created_file {
                remove_partial_file(&task.dest_path).await;
            }
            store.update(&task.id, |job| job.mark_failed(&message));
            error!("Download {} failed: {}", task.id, message);
        }
    }
}

async fn fetch(
    client: &Client,
    store: &ProgressStore,
    task: &DownloadTask,
    cancel: &CancellationToken,
    created_file: &mut bool,
) -> Result<Outcome, String> {
    let dest = &task.dest_path;
    let parent = dest
        .parent()
        .ok_or_else(|| format!("Destination {} has no parent directory", dest.display()))?;
    fs::create_dir_all(parent)
        .await
        .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;
    if fs::try_exists(dest).await.unwrap_or(false) {
        return Err(format!("File already exists: {}", dest.display()));
    }

    let mut request = client.get(&task.request.url);
    if let Some(token) = &task.request.bearer {
        request = request.bearer_auth(token);
    }
    debug!("Download {} requesting {}", task.id, task.host);
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(Outcome::Cancelled),
        sent = tokio::time::timeout(REQUEST_TIMEOUT, request.send()) => sent
            .map_err(|_| format!("Timed out after {}s waiting for {}", REQUEST_TIMEOUT.as_secs(), task.host))?
            .map_err(|e| format!("Request to {} failed: {}", task.host, e))?,
    };

    if !response.status().is_success() {
        return Err(describe_http_failure(response.status(), &task.host));
    }

    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        check_free_space(parent, total_size)?;
    }
    store.update(&task.id, |job| {
        job.status = DownloadStatus::Downloading;
        job.total_size = total_size;
        job.refresh_progress();
    });
    if cancel.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }

    let mut file = File::create(dest)
        .await
        .map_err(|e| format!("Failed to create file {}: {}", dest.display(), e))?;
    *created_file = true;

    let mut stream = response.bytes_stream();
    let mut speed = SpeedTracker::new(Instant::now());

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                drop(file);
                return Ok(Outcome::Cancelled);
            }
            next = tokio::time::timeout(REQUEST_TIMEOUT, stream.next()) => next,
        };
        let item = match next {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(_) => {
                return Err(format!(
                    "No data received from {} for {}s",
                    task.host,
                    REQUEST_TIMEOUT.as_secs()
                ))
            }
        };
        let chunk = item.map_err(|e| format!("Error while receiving data from {}: {}", task.host, e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("Error writing to {}: {}", dest.display(), e))?;

        let sampled = speed.record(chunk.len() as u64, Instant::now());
        store.update(&task.id, |job| job.add_downloaded(chunk.len() as u64, sampled));
    }

    file.flush()
        .await
        .map_err(|e| format!("Failed to flush {}: {}", dest.display(), e))?;
    file.sync_all()
        .await
        .map_err(|e| format!("Failed to sync {}: {}", dest.display(), e))?;
    Ok(Outcome::Completed)
}

fn check_free_space(dir: &Path, needed: u64) -> Result<(), String> {
    match fs2::available_space(dir) {
        Ok(available) if needed > available => Err(format!(
            "Not enough disk space in {}: need {} bytes, {} available",
            dir.display(),
            needed,
            available
        )),
        Ok(_) => Ok(()),
        Err(e) => {
            warn!("Could not check free space in {}: {}", dir.display(), e);
            Ok(())
        }
    }
}
