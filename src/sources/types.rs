// model-linker/src/sources/types.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where a remote download location came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Popular,
    ModelList,
    Huggingface,
    Civitai,
    /// A URL on some other host, taken from the workflow itself.
    Workflow,
}

impl SourceKind {
    /// Labels a URL by its host.
    pub fn from_url(url: &str) -> Self {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
            .unwrap_or_default();
        if host == "huggingface.co" || host.ends_with(".huggingface.co") {
            SourceKind::Huggingface
        } else if host == "civitai.com" || host.ends_with(".civitai.com") {
            SourceKind::Civitai
        } else {
            SourceKind::Workflow
        }
    }
}

/// How strictly a provider compares filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    /// Providers that support it may return close, non-identical names.
    Fuzzy,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    Similar,
    Workflow,
}

/// A remote location a missing file can be fetched from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteSource {
    pub source: SourceKind,
    pub filename: String,
    /// Direct download URL.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub match_type: MatchKind,
    /// Percentage, only for non-exact matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl RemoteSource {
    pub fn new(source: SourceKind, filename: &str, url: &str, match_type: MatchKind) -> Self {
        Self {
            source,
            filename: filename.to_string(),
            url: url.to_string(),
            directory: None,
            name: None,
            model_type: None,
            repo: None,
            page_url: None,
            size: None,
            match_type,
            confidence: None,
        }
    }
}

/// One remote lookup backend.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// `Ok(None)` is a clean miss; `Err` means the backend could not be asked.
    async fn lookup(&self, filename: &str, mode: MatchMode) -> Result<Option<RemoteSource>, String>;

    /// Several ranked candidates for `query`. Backends that can only answer
    /// one name at a time list nothing.
    async fn search_many(&self, _query: &str, _limit: usize) -> Result<Vec<RemoteSource>, String> {
        Ok(Vec::new())
    }

    /// Drops cached state and re-reads local data. Returns the entry count
    /// for file-backed catalogs.
    fn reload(&self) -> Option<usize> {
        None
    }
}
