// model-linker/src/download_manager/job_types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Starting,
    Downloading,
    Completed,
    Error,
    Cancelled,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Error | DownloadStatus::Cancelled)
    }
}

/// Progress record of one background download.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub id: String,
    pub url: String,
    pub filename: String,
    pub category: String,
    pub dest_path: PathBuf,
    pub status: DownloadStatus,
    pub downloaded: u64,
    /// 0 while the size is unknown.
    pub total_size: u64,
    /// Percentage; absent until the total size is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Smoothed bytes per second.
    pub speed: f64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadJob {
    pub fn new(id: &str, url: &str, filename: &str, category: &str, dest_path: PathBuf) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
            filename: filename.to_string(),
            category: category.to_string(),
            dest_path,
            status: DownloadStatus::Starting,
            downloaded: 0,
            total_size: 0,
            progress: None,
            speed: 0.0,
            started_at: Utc::now(),
            error: None,
        }
    }

    pub fn refresh_progress(&mut self) {
        self.progress = if self.total_size > 0 {
            let pct = self.downloaded as f64 / self.total_size as f64 * 100.0;
            Some((pct.min(100.0) * 10.0).round() / 10.0)
        } else {
            None
        };
    }

    /// Records `bytes` more received. Counters only move forward.
    pub fn add_downloaded(&mut self, bytes: u64, speed: Option<f64>) {
        self.downloaded = self.downloaded.saturating_add(bytes);
        if let Some(speed) = speed {
            self.speed = speed.max(0.0);
        }
        self.refresh_progress();
    }

    pub fn mark_completed(&mut self) {
        if self.total_size == 0 {
            self.total_size = self.downloaded;
        }
        self.status = DownloadStatus::Completed;
        self.speed = 0.0;
        self.progress = if self.total_size > 0 { Some(100.0) } else { None };
    }

    pub fn mark_failed(&mut self, message: &str) {
        self.status = DownloadStatus::Error;
        self.speed = 0.0;
        self.error = Some(message.to_string());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = DownloadStatus::Cancelled;
        self.speed = 0.0;
    }
}
