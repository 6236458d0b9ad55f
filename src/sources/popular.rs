// model-linker/src/sources/popular.rs

use async_trait::async_trait;
use log::{error, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};

use super::types::{MatchKind, MatchMode, RemoteSource, SourceKind, SourceProvider};

pub const POPULAR_MODELS_FILE: &str = "popular-models.json";
pub const MODEL_ALIASES_FILE: &str = "model-aliases.json";

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PopularEntry {
    pub url: String,
    #[serde(rename = "type", default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Deserialize, Default)]
struct PopularFile {
    #[serde(default)]
    models: BTreeMap<String, PopularEntry>,
}

#[derive(Deserialize, Default)]
struct AliasFile {
    #[serde(default)]
    aliases: BTreeMap<String, Vec<String>>,
}

/// Reads a metadata JSON file; a missing or malformed file yields the default.
pub(crate) fn read_metadata<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let parsed = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
        .and_then(|text| {
            serde_json::from_str(&text).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
        });
    match parsed {
        Ok(value) => value,
        Err(e) => {
            error!("{}", e);
            T::default()
        }
    }
}

#[derive(Debug, Default)]
struct PopularData {
    models: BTreeMap<String, PopularEntry>,
    /// canonical filename -> other names it is known by
    aliases: BTreeMap<String, Vec<String>>,
}

impl PopularData {
    fn read(metadata_dir: &Path) -> Self {
        let popular: PopularFile = read_metadata(&metadata_dir.join(POPULAR_MODELS_FILE));
        let aliases: AliasFile = read_metadata(&metadata_dir.join(MODEL_ALIASES_FILE));
        info!(
            "Loaded {} popular models and {} alias groups",
            popular.models.len(),
            aliases.aliases.len()
        );
        Self { models: popular.models, aliases: aliases.aliases }
    }
}

/// Curated filename -> URL list, with alternative spellings.
#[derive(Debug, Default)]
pub struct PopularCatalog {
    data: RwLock<PopularData>,
    /// Set when loaded from disk; `reload` re-reads from here.
    metadata_dir: Option<PathBuf>,
}

impl PopularCatalog {
    pub fn new(models: BTreeMap<String, PopularEntry>, aliases: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            data: RwLock::new(PopularData { models, aliases }),
            metadata_dir: None,
        }
    }

    pub fn load(metadata_dir: &Path) -> Self {
        Self {
            data: RwLock::new(PopularData::read(metadata_dir)),
            metadata_dir: Some(metadata_dir.to_path_buf()),
        }
    }

    fn data(&self) -> RwLockReadGuard<'_, PopularData> {
        self.data.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn len(&self) -> usize {
        self.data().models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().models.is_empty()
    }

    /// Direct name, then case-insensitive name, then alias.
    pub fn find(&self, filename: &str) -> Option<(String, PopularEntry)> {
        let data = self.data();
        if let Some(entry) = data.models.get(filename) {
            return Some((filename.to_string(), entry.clone()));
        }

        let lowered = filename.to_lowercase();
        if let Some((name, entry)) = data.models.iter().find(|(name, _)| name.to_lowercase() == lowered) {
            return Some((name.clone(), entry.clone()));
        }

        data.aliases
            .iter()
            .filter(|(_, names)| names.iter().any(|alias| alias == filename || alias.to_lowercase() == lowered))
            .find_map(|(canonical, _)| data.models.get_key_value(canonical.as_str()))
            .map(|(name, entry)| (name.clone(), entry.clone()))
    }

    /// Every entry whose name contains `query` (case-insensitive), in name order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<RemoteSource> {
        let query = query.to_lowercase();
        self.data()
            .models
            .iter()
            .filter(|(name, _)| name.to_lowercase().contains(&query))
            .take(limit)
            .map(|(name, entry)| to_source(name, entry))
            .collect()
    }

    /// Re-reads both files; a catalog built in memory is left as is.
    pub fn reload_files(&self) -> usize {
        if let Some(dir) = &self.metadata_dir {
            let fresh = PopularData::read(dir);
            *self.data.write().unwrap_or_else(|p| p.into_inner()) = fresh;
        }
        self.len()
    }
}

fn to_source(name: &str, entry: &PopularEntry) -> RemoteSource {
    let mut source = RemoteSource::new(SourceKind::Popular, name, &entry.url, MatchKind::Exact);
    source.directory = entry.directory.clone();
    source.model_type = entry.model_type.clone();
    source
}

#[async_trait]
impl SourceProvider for PopularCatalog {
    fn kind(&self) -> SourceKind {
        SourceKind::Popular
    }

    async fn lookup(&self, filename: &str, _mode: MatchMode) -> Result<Option<RemoteSource>, String> {
        Ok(self.find(filename).map(|(name, entry)| to_source(&name, &entry)))
    }

    async fn search_many(&self, query: &str, limit: usize) -> Result<Vec<RemoteSource>, String> {
        Ok(self.search(query, limit))
    }

    fn reload(&self) -> Option<usize> {
        Some(self.reload_files())
    }
}
