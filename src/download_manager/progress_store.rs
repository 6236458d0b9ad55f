// model-linker/src/download_manager/progress_store.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::job_types::DownloadJob;

/// Job id -> progress record. The lock is held only while a record is read
/// or patched, never across network or disk I/O.
#[derive(Clone, Default)]
pub struct ProgressStore {
    jobs: Arc<Mutex<HashMap<String, DownloadJob>>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DownloadJob>> {
        self.jobs.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn insert(&self, job: DownloadJob) {
        self.lock().insert(job.id.clone(), job);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<DownloadJob> {
        self.lock().get(id).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, DownloadJob> {
        self.lock().clone()
    }

    /// Applies `patch` to the job; false when the id is unknown.
    pub fn update<F>(&self, id: &str, patch: F) -> bool
    where
        F: FnOnce(&mut DownloadJob),
    {
        match self.lock().get_mut(id) {
            Some(job) => {
                patch(job);
                true
            }
            None => false,
        }
    }

    /// Drops every job in a terminal state and returns their ids.
    pub fn remove_terminal(&self) -> Vec<String> {
        let mut jobs = self.lock();
        let finished: Vec<String> = jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .map(|job| job.id.clone())
            .collect();
        for id in &finished {
            jobs.remove(id);
        }
        finished
    }
}
