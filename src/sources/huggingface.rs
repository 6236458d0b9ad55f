// model-linker/src/sources/huggingface.rs

use async_trait::async_trait;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::inventory::path_utils::{file_name_of, strip_extension};

use super::types::{MatchKind, MatchMode, RemoteSource, SourceKind, SourceProvider};

pub const DEFAULT_HUGGINGFACE_BASE: &str = "https://huggingface.co";

const SEARCH_LIMIT: u32 = 10;
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
const TREE_TIMEOUT: Duration = Duration::from_secs(10);

static PRECISION_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[-_]?(fp16|fp32|fp8|bf16|e4m3fn|scaled|pruned|emaonly|q4|q8).*$")
        .expect("valid precision suffix pattern")
});

/// Stem without precision/format suffixes, which search engines rarely index.
pub fn clean_search_term(filename: &str) -> String {
    PRECISION_SUFFIX
        .replace(strip_extension(filename), "")
        .into_owned()
}

fn encode_repo_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Deserialize)]
struct RepoSummary {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
struct RepoFile {
    #[serde(default)]
    path: String,
    #[serde(default)]
    size: Option<u64>,
}

/// Finds the first Hub repository holding a file with exactly this name.
pub struct HuggingFaceProvider {
    client: Client,
    base_url: String,
    token: Option<String>,
    cache: Mutex<HashMap<String, Option<RemoteSource>>>,
}

impl HuggingFaceProvider {
    pub fn new(client: Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn download_url(&self, repo: &str, path: &str) -> String {
        format!("{}/{}/resolve/main/{}", self.base_url, repo, encode_repo_path(path))
    }

    fn get(&self, url: &str, timeout: Duration) -> reqwest::RequestBuilder {
        let request = self.client.get(url).timeout(timeout);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn cached(&self, filename: &str) -> Option<Option<RemoteSource>> {
        self.cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(filename)
            .cloned()
    }

    fn remember(&self, filename: &str, result: Option<RemoteSource>) {
        self.cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(filename.to_string(), result);
    }

    async fn repo_files(&self, repo_id: &str) -> Result<Vec<RepoFile>, String> {
        let url = format!("{}/api/models/{}/tree/main", self.base_url, repo_id);
        let response = self
            .get(&url, TREE_TIMEOUT)
            .send()
            .await
            .map_err(|e| format!("Failed to list files of {}: {}", repo_id, e))?;
        if !response.status().is_success() {
            return Err(format!("Listing {} returned HTTP {}", repo_id, response.status()));
        }
        response
            .json()
            .await
            .map_err(|e| format!("Invalid file listing for {}: {}", repo_id, e))
    }

    async fn search(&self, filename: &str) -> Result<Option<RemoteSource>, String> {
        let term = clean_search_term(filename);
        let url = format!(
            "{}/api/models?search={}&limit={}",
            self.base_url,
            urlencoding::encode(&term),
            SEARCH_LIMIT
        );
        let response = self
            .get(&url, SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| format!("HuggingFace search for {} failed: {}", term, e))?;
        if !response.status().is_success() {
            return Err(format!("HuggingFace search returned HTTP {}", response.status()));
        }
        let repos: Vec<RepoSummary> = response
            .json()
            .await
            .map_err(|e| format!("Invalid HuggingFace search response: {}", e))?;

        let wanted = filename.to_lowercase();
        for repo in repos.iter().filter(|r| !r.id.is_empty()) {
            let files = match self.repo_files(&repo.id).await {
                Ok(files) => files,
                Err(e) => {
                    debug!("{}", e);
                    continue;
                }
            };
            let Some(file) = files
                .into_iter()
                .find(|f| file_name_of(&f.path).to_lowercase() == wanted)
            else {
                continue;
            };

            info!("Found {} on HuggingFace: {}", filename, repo.id);
            let mut source = RemoteSource::new(
                SourceKind::Huggingface,
                file_name_of(&file.path),
                &self.download_url(&repo.id, &file.path),
                MatchKind::Exact,
            );
            source.repo = Some(repo.id.clone());
            source.page_url = Some(format!("{}/{}", self.base_url, repo.id));
            source.size = file.size;
            return Ok(Some(source));
        }
        Ok(None)
    }
}

#[async_trait]
impl SourceProvider for HuggingFaceProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::Huggingface
    }

    async fn lookup(&self, filename: &str, _mode: MatchMode) -> Result<Option<RemoteSource>, String> {
        if let Some(hit) = self.cached(filename) {
            return Ok(hit);
        }
        match self.search(filename).await {
            Ok(result) => {
                self.remember(filename, result.clone());
                Ok(result)
            }
            Err(e) => {
                warn!("{}", e);
                Err(e)
            }
        }
    }

    fn reload(&self) -> Option<usize> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner()).clear();
        None
    }
}
