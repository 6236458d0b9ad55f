// model-linker/src/sources/model_list.rs

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};

use crate::inventory::path_utils::strip_extension;
use crate::matcher::similarity_ratio;

use super::popular::read_metadata;
use super::types::{MatchKind, MatchMode, RemoteSource, SourceKind, SourceProvider};

pub const MODEL_LIST_FILE: &str = "model-list.json";

const SUBSTRING_MIN_SCORE: f64 = 0.5;
const SIMILAR_MIN_SCORE: f64 = 0.6;
const LISTING_MIN_SCORE: f64 = 0.4;

/// One row of the community model list.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ModelListEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub model_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub save_path: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Deserialize, Default)]
struct ModelListFile {
    #[serde(default)]
    models: Vec<ModelListEntry>,
}

/// Stem lower-cased with `-`, `_` and `.` turned into spaces.
fn normalize_name(filename: &str) -> String {
    strip_extension(filename)
        .to_lowercase()
        .replace(['-', '_', '.'], " ")
}

fn read_models(metadata_dir: &Path) -> Vec<ModelListEntry> {
    let file: ModelListFile = read_metadata(&metadata_dir.join(MODEL_LIST_FILE));
    info!("Loaded {} models from {}", file.models.len(), MODEL_LIST_FILE);
    file.models
}

fn downloadable(models: &[ModelListEntry]) -> impl Iterator<Item = &ModelListEntry> {
    models
        .iter()
        .filter(|m| !m.filename.is_empty() && !m.url.is_empty())
}

#[derive(Debug, Default)]
pub struct ModelListCatalog {
    models: RwLock<Vec<ModelListEntry>>,
    metadata_dir: Option<PathBuf>,
}

impl ModelListCatalog {
    pub fn new(models: Vec<ModelListEntry>) -> Self {
        Self { models: RwLock::new(models), metadata_dir: None }
    }

    pub fn load(metadata_dir: &Path) -> Self {
        Self {
            models: RwLock::new(read_models(metadata_dir)),
            metadata_dir: Some(metadata_dir.to_path_buf()),
        }
    }

    fn models(&self) -> RwLockReadGuard<'_, Vec<ModelListEntry>> {
        self.models.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn len(&self) -> usize {
        self.models().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models().is_empty()
    }

    /// Re-reads the list file; a catalog built in memory is left as is.
    pub fn reload_files(&self) -> usize {
        if let Some(dir) = &self.metadata_dir {
            let fresh = read_models(dir);
            *self.models.write().unwrap_or_else(|p| p.into_inner()) = fresh;
        }
        self.len()
    }

    /// Up to `limit` entries scoring above 0.4, best first.
    pub fn search(&self, filename: &str, limit: usize) -> Vec<RemoteSource> {
        let target_norm = normalize_name(filename);
        let models = self.models();
        let mut scored: Vec<(&ModelListEntry, f64)> = downloadable(&models)
            .map(|model| (model, similarity_ratio(&target_norm, &normalize_name(&model.filename))))
            .filter(|(_, score)| *score > LISTING_MIN_SCORE)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(limit)
            .map(|(model, score)| to_source(model, MatchKind::Similar, Some(score)))
            .collect()
    }

    fn exact<'a>(models: &'a [ModelListEntry], filename: &str) -> Option<&'a ModelListEntry> {
        let lowered = filename.to_lowercase();
        downloadable(models).find(|m| m.filename.to_lowercase() == lowered)
    }

    /// Best entry whose stem contains, or is contained in, the target stem.
    fn substring<'a>(models: &'a [ModelListEntry], filename: &str) -> Option<(&'a ModelListEntry, f64)> {
        let target_base = strip_extension(filename).to_lowercase();
        let target_norm = normalize_name(filename);
        let mut best: Option<(&ModelListEntry, f64)> = None;

        for model in downloadable(models) {
            let model_base = strip_extension(&model.filename).to_lowercase();
            if !model_base.contains(&target_base) && !target_base.contains(&model_base) {
                continue;
            }
            let score = similarity_ratio(&target_norm, &normalize_name(&model.filename));
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((model, score));
            }
        }
        best.filter(|(_, score)| *score > SUBSTRING_MIN_SCORE)
    }

    fn similar<'a>(models: &'a [ModelListEntry], filename: &str) -> Option<(&'a ModelListEntry, f64)> {
        let target_norm = normalize_name(filename);
        let mut best: Option<(&ModelListEntry, f64)> = None;
        for model in downloadable(models) {
            let score = similarity_ratio(&target_norm, &normalize_name(&model.filename));
            if score > SIMILAR_MIN_SCORE && best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((model, score));
            }
        }
        best
    }

    pub fn find(&self, filename: &str, mode: MatchMode) -> Option<RemoteSource> {
        let models = self.models();
        if let Some(model) = Self::exact(&models, filename) {
            return Some(to_source(model, MatchKind::Exact, None));
        }
        if mode == MatchMode::Exact {
            return None;
        }
        if let Some((model, score)) = Self::substring(&models, filename) {
            debug!("Model list fuzzy hit for {}: {} ({:.2})", filename, model.filename, score);
            return Some(to_source(model, MatchKind::Fuzzy, Some(score)));
        }
        Self::similar(&models, filename)
            .map(|(model, score)| to_source(model, MatchKind::Similar, Some(score)))
    }
}

fn to_source(model: &ModelListEntry, match_type: MatchKind, score: Option<f64>) -> RemoteSource {
    let mut source = RemoteSource::new(SourceKind::ModelList, &model.filename, &model.url, match_type);
    source.directory = Some(
        model
            .save_path
            .clone()
            .unwrap_or_else(|| "checkpoints".to_string()),
    );
    if !model.name.is_empty() {
        source.name = Some(model.name.clone());
    }
    if !model.model_type.is_empty() {
        source.model_type = Some(model.model_type.clone());
    }
    source.size = model.size;
    source.confidence = score.map(|s| (s * 1000.0).round() / 10.0);
    source
}

#[async_trait]
impl SourceProvider for ModelListCatalog {
    fn kind(&self) -> SourceKind {
        SourceKind::ModelList
    }

    async fn lookup(&self, filename: &str, mode: MatchMode) -> Result<Option<RemoteSource>, String> {
        Ok(self.find(filename, mode))
    }

    async fn search_many(&self, query: &str, limit: usize) -> Result<Vec<RemoteSource>, String> {
        Ok(self.search(query, limit))
    }

    fn reload(&self) -> Option<usize> {
        Some(self.reload_files())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(filename: &str, url: &str) -> ModelListEntry {
        ModelListEntry {
            name: format!("{} model", filename),
            model_type: "checkpoint".into(),
            filename: filename.into(),
            url: url.into(),
            save_path: None,
            size: None,
        }
    }

    fn catalog() -> ModelListCatalog {
        ModelListCatalog::new(vec![
            entry("no_url.safetensors", ""),
            entry("4x-UltraSharp.pth", "https://x/4x-UltraSharp.pth"),
            entry("control_v11p_sd15_canny.pth", "https://x/canny.pth"),
            entry("v1-5-pruned-emaonly.safetensors", "https://x/v15.safetensors"),
        ])
    }

    #[test]
    fn exact_is_case_insensitive_and_needs_a_url() {
        let hit = catalog().find("4X-ULTRASHARP.pth", MatchMode::Exact).unwrap();
        assert_eq!(hit.filename, "4x-UltraSharp.pth");
        assert_eq!(hit.match_type, MatchKind::Exact);
        assert_eq!(hit.directory.as_deref(), Some("checkpoints"));
        assert!(hit.confidence.is_none());

        assert!(catalog().find("no_url.safetensors", MatchMode::Fuzzy).is_none());
    }

    #[test]
    fn exact_mode_never_guesses() {
        assert!(catalog().find("control_v11p_sd15_canny_fp16.pth", MatchMode::Exact).is_none());
    }

    #[test]
    fn fuzzy_mode_uses_substring_then_similarity() {
        let hit = catalog().find("control_v11p_sd15_canny_fp16.pth", MatchMode::Fuzzy).unwrap();
        assert_eq!(hit.filename, "control_v11p_sd15_canny.pth");
        assert_eq!(hit.match_type, MatchKind::Fuzzy);
        assert!(hit.confidence.unwrap() > 50.0);

        let hit = catalog().find("v1-5-pruned-emaonly-fp16.safetensors", MatchMode::Fuzzy).unwrap();
        assert_eq!(hit.url, "https://x/v15.safetensors");

        assert!(catalog().find("zzzz.bin", MatchMode::Fuzzy).is_none());
    }

    #[test]
    fn similarity_stage_catches_reworded_names() {
        let catalog = ModelListCatalog::new(vec![entry("sdxl_vae.safetensors", "https://x/sdxl_vae")]);
        let hit = catalog.find("sdxl-vae-fix.safetensors", MatchMode::Fuzzy).unwrap();
        assert_eq!(hit.match_type, MatchKind::Similar);
        assert!(hit.confidence.unwrap() > 60.0);
    }

    #[test]
    fn listing_ranks_everything_above_forty_percent() {
        let catalog = ModelListCatalog::new(vec![
            entry("control_v11p_sd15_canny.pth", "https://x/canny.pth"),
            entry("control_v11p_sd15_depth.pth", "https://x/depth.pth"),
            entry("control_v11p_sd15_canny_fp16.pth", ""),
            entry("zzzz.bin", "https://x/z"),
        ]);
        let hits = catalog.search("control_v11p_sd15_canny.pth", 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].filename, "control_v11p_sd15_canny.pth");
        assert_eq!(hits[0].confidence, Some(100.0));
        assert_eq!(hits[1].filename, "control_v11p_sd15_depth.pth");
        assert!(hits[1].confidence.unwrap() > 40.0);

        assert_eq!(catalog.search("control_v11p_sd15_canny.pth", 1).len(), 1);
    }

    #[test]
    fn reload_rereads_the_list_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MODEL_LIST_FILE);
        std::fs::write(&path, r#"{"models": []}"#).unwrap();
        let catalog = ModelListCatalog::load(dir.path());
        assert!(catalog.is_empty());

        std::fs::write(
            &path,
            r#"{"models": [{"name": "A", "type": "vae", "filename": "a.pt", "url": "https://x/a.pt", "size": 42}]}"#,
        )
        .unwrap();
        assert_eq!(catalog.reload_files(), 1);
        let hit = catalog.find("a.pt", MatchMode::Exact).unwrap();
        assert_eq!(hit.size, Some(42));
    }

    #[test]
    fn normalized_names_drop_separators() {
        assert_eq!(normalize_name("SDXL_vae-v1.0.safetensors"), "sdxl vae v1 0");
    }
}
