// model-linker/src/download_manager/mod.rs

pub mod job_runner;
pub mod job_types;
pub mod progress_store;
pub mod request_auth;
pub mod speed_tracker;

use log::{debug, info};
use reqwest::Client;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::inventory::path_utils::{file_name_of, plain_relative_path};

use job_runner::{run_download, DownloadTask};
pub use job_types::{DownloadJob, DownloadStatus};
pub use progress_store::ProgressStore;
pub use request_auth::{authorize, filename_from_url, host_of, Credentials};

/// What the caller wants fetched and where.
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    pub url: String,
    /// Derived from the URL when absent.
    pub filename: Option<String>,
    pub category: String,
    /// Directory of the category; `subfolder` is created below it.
    pub target_dir: PathBuf,
    pub subfolder: Option<String>,
    pub huggingface_token: Option<String>,
    pub civitai_api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartedDownload {
    pub id: String,
    pub filename: String,
    pub dest_path: PathBuf,
}

/// Relative subfolder made only of plain components.
fn safe_subfolder(subfolder: &str) -> Result<PathBuf, String> {
    let trimmed = subfolder.trim().trim_matches(|c: char| c == '/' || c == '\\');
    plain_relative_path(trimmed).ok_or_else(|| format!("Invalid subfolder: {}", subfolder))
}

/// Background downloads with pollable progress and cooperative cancellation.
#[derive(Clone)]
pub struct DownloadManager {
    client: Client,
    store: ProgressStore,
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
    credentials: Credentials,
}

impl DownloadManager {
    pub fn new(credentials: Credentials) -> Result<Self, String> {
        let client = Client::builder()
            .user_agent("ModelLinker/1.0")
            .connect_timeout(job_runner::REQUEST_TIMEOUT)
            .read_timeout(job_runner::REQUEST_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| format!("Failed to build reqwest client: {}", e))?;
        Ok(Self {
            client,
            store: ProgressStore::new(),
            tokens: Arc::new(Mutex::new(HashMap::new())),
            credentials,
        })
    }

    fn new_job_id(&self) -> String {
        loop {
            let id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
            if !self.store.contains(&id) {
                return id;
            }
        }
    }

    /// Registers the job and spawns its task; returns without waiting for
    /// any network I/O. Must be called from within a tokio runtime.
    pub fn start_download(&self, request: DownloadRequest) -> Result<StartedDownload, String> {
        let raw_name = request
            .filename
            .clone()
            .filter(|f| !f.trim().is_empty())
            .or_else(|| filename_from_url(&request.url))
            .ok_or_else(|| format!("Could not determine a filename from {}", request.url))?;
        let filename = file_name_of(raw_name.trim()).to_string();
        if filename.is_empty() || filename == "." || filename == ".." {
            return Err(format!("Invalid filename: {}", raw_name));
        }
        let host = host_of(&request.url).ok_or_else(|| format!("Invalid download URL: {}", request.url))?;

        let mut dest_dir = request.target_dir.clone();
        if let Some(subfolder) = request.subfolder.as_deref() {
            dest_dir.push(safe_subfolder(subfolder)?);
        }
        let dest_path = dest_dir.join(&filename);

        let credentials = self
            .credentials
            .overridden_by(request.huggingface_token.clone(), request.civitai_api_key.clone());
        let authorized = authorize(&request.url, &credentials);

        let id = self.new_job_id();
        self.store.insert(DownloadJob::new(
            &id,
            &request.url,
            &filename,
            &request.category,
            dest_path.clone(),
        ));
        let token = CancellationToken::new();
        self.tokens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id.clone(), token.clone());

        info!("Starting download {}: {} -> {}", id, request.url, dest_path.display());
        let task = DownloadTask {
            id: id.clone(),
            request: authorized,
            host,
            dest_path: dest_path.clone(),
        };
        tokio::spawn(run_download(self.client.clone(), self.store.clone(), task, token));

        Ok(StartedDownload { id, filename, dest_path })
    }

    pub fn get_progress(&self, id: &str) -> Option<DownloadJob> {
        self.store.get(id)
    }

    pub fn all_progress(&self) -> HashMap<String, DownloadJob> {
        self.store.snapshot()
    }

    /// Signals the job's task. Takes effect at the next chunk; unknown and
    /// finished jobs are left alone. Returns whether a running job was signalled.
    pub fn cancel(&self, id: &str) -> bool {
        let running = self
            .store
            .get(id)
            .map(|job| !job.status.is_terminal())
            .unwrap_or(false);
        if !running {
            debug!("Cancel for {} ignored: not running", id);
            return false;
        }
        match self.tokens.lock().unwrap_or_else(|p| p.into_inner()).get(id) {
            Some(token) => {
                token.cancel();
                info!("Cancellation requested for download {}", id);
                true
            }
            None => false,
        }
    }

    /// Forgets every finished job; returns how many were removed.
    pub fn clear_finished(&self) -> usize {
        let removed = self.store.remove_terminal();
        let mut tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
        for id in &removed {
            tokens.remove(id);
        }
        removed.len()
    }
}
