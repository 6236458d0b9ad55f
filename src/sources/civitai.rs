// model-linker/src/sources/civitai.rs

use async_trait::async_trait;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::huggingface::clean_search_term as strip_precision;
use super::types::{MatchKind, MatchMode, RemoteSource, SourceKind, SourceProvider};

pub const DEFAULT_CIVITAI_BASE: &str = "https://civitai.com";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

static TRAILING_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[-_]?v?\d+(\.\d+)*$").expect("valid version pattern"));

/// CivitAI titles rarely carry version numbers, so those go too.
pub fn clean_search_term(filename: &str) -> String {
    let base = strip_precision(filename);
    TRAILING_VERSION.replace(&base, "").into_owned()
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<ModelItem>,
}

#[derive(Deserialize)]
struct ModelItem {
    id: Option<u64>,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    model_type: String,
    #[serde(rename = "modelVersions", default)]
    model_versions: Vec<ModelVersion>,
}

#[derive(Deserialize)]
struct ModelVersion {
    #[serde(default)]
    files: Vec<VersionFile>,
}

#[derive(Deserialize)]
struct VersionFile {
    #[serde(default)]
    name: String,
    #[serde(rename = "downloadUrl", default)]
    download_url: String,
    #[serde(rename = "sizeKB", default)]
    size_kb: Option<f64>,
}

pub struct CivitaiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    cache: Mutex<HashMap<String, Option<RemoteSource>>>,
}

impl CivitaiProvider {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn search(&self, filename: &str) -> Result<Option<RemoteSource>, String> {
        let term = clean_search_term(filename);
        let url = format!(
            "{}/api/v1/models?query={}&limit=10",
            self.base_url,
            urlencoding::encode(&term)
        );
        let mut request = self.client.get(&url).timeout(SEARCH_TIMEOUT);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| format!("CivitAI search for {} failed: {}", term, e))?;
        if !response.status().is_success() {
            return Err(format!("CivitAI search returned HTTP {}", response.status()));
        }
        let page: SearchPage = response
            .json()
            .await
            .map_err(|e| format!("Invalid CivitAI search response: {}", e))?;

        let wanted = filename.to_lowercase();
        for item in &page.items {
            let file = item
                .model_versions
                .iter()
                .flat_map(|version| version.files.iter())
                .find(|f| f.name.to_lowercase() == wanted && !f.download_url.is_empty());
            let Some(file) = file else {
                continue;
            };

            info!("Found {} on CivitAI: {}", filename, item.name);
            let mut source =
                RemoteSource::new(SourceKind::Civitai, &file.name, &file.download_url, MatchKind::Exact);
            source.name = Some(item.name.clone()).filter(|n| !n.is_empty());
            source.model_type = Some(item.model_type.clone()).filter(|t| !t.is_empty());
            source.page_url = item.id.map(|id| format!("{}/models/{}", self.base_url, id));
            source.size = file.size_kb.map(|kb| (kb * 1024.0).round() as u64);
            return Ok(Some(source));
        }
        Ok(None)
    }
}

#[async_trait]
impl SourceProvider for CivitaiProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::Civitai
    }

    async fn lookup(&self, filename: &str, _mode: MatchMode) -> Result<Option<RemoteSource>, String> {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(filename)
            .cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let result = self.search(filename).await.map_err(|e| {
            warn!("{}", e);
            e
        })?;
        self.cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(filename.to_string(), result.clone());
        Ok(result)
    }

    fn reload(&self) -> Option<usize> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner()).clear();
        None
    }
}
