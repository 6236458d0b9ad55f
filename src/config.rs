// model-linker/src/config.rs

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::inventory::{CategoryFolders, FolderRegistry};
use crate::sources::civitai::DEFAULT_CIVITAI_BASE;
use crate::sources::huggingface::DEFAULT_HUGGINGFACE_BASE;

pub const CONFIG_PATH_ENV: &str = "MODEL_LINKER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./model-linker.yaml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LinkerConfig {
    pub bind_addr: String,
    /// ComfyUI-style `models/` directory; every standard category is rooted here.
    pub models_base: Option<PathBuf>,
    /// Extensions may be written with or without the leading dot.
    pub categories: BTreeMap<String, CategoryFolders>,
    pub metadata_dir: PathBuf,
    pub huggingface_token: Option<String>,
    pub civitai_api_key: Option<String>,
    pub similarity_threshold: f64,
    pub max_matches_per_model: usize,
    pub log_config: PathBuf,
    pub huggingface_api_base: String,
    pub civitai_api_base: String,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8189".to_string(),
            models_base: None,
            categories: BTreeMap::new(),
            metadata_dir: PathBuf::from("./metadata"),
            huggingface_token: None,
            civitai_api_key: None,
            similarity_threshold: 0.0,
            max_matches_per_model: 10,
            log_config: PathBuf::from("./log4rs.yaml"),
            huggingface_api_base: DEFAULT_HUGGINGFACE_BASE.to_string(),
            civitai_api_base: DEFAULT_CIVITAI_BASE.to_string(),
        }
    }
}

impl LinkerConfig {
    /// Parses a YAML config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        serde_yaml::from_str(&text).map_err(|e| format!("Failed to parse config {}: {}", path.display(), e))
    }

    /// File named by `MODEL_LINKER_CONFIG` (or the default path), then
    /// environment overrides.
    pub fn load() -> Result<Self, String> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(bind) = non_empty("MODEL_LINKER_BIND") {
            self.bind_addr = bind;
        }
        if let Some(dir) = non_empty("MODEL_LINKER_MODELS_DIR") {
            self.models_base = Some(PathBuf::from(dir));
        }
        if let Some(token) = non_empty("HF_TOKEN") {
            self.huggingface_token = Some(token);
        }
        if let Some(key) = non_empty("CIVITAI_API_KEY") {
            self.civitai_api_key = Some(key);
        }
    }

    /// Category registry: the standard layout under `models_base` first,
    /// explicit categories appended after.
    pub fn folder_registry(&self) -> FolderRegistry {
        let mut registry = FolderRegistry::new();
        if let Some(base) = &self.models_base {
            registry.add_models_base(base);
        }
        for (category, folders) in &self.categories {
            registry.add_category(category, folders.paths.clone(), folders.extensions.clone());
        }
        if registry.model_categories().next().is_none() {
            warn!("No model directories configured; set models_base or categories");
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = LinkerConfig::from_file(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, LinkerConfig::default());
        assert_eq!(config.max_matches_per_model, 10);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("linker.yaml");
        fs::write(
            &path,
            "bind_addr: 0.0.0.0:9000\nsimilarity_threshold: 0.4\ncategories:\n  loras:\n    paths: [/data/loras]\n    extensions: [safetensors]\n",
        )
        .unwrap();
        let config = LinkerConfig::from_file(&path).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.similarity_threshold, 0.4);
        assert_eq!(config.categories["loras"].paths, vec![PathBuf::from("/data/loras")]);
        assert_eq!(config.categories["loras"].extensions, vec!["safetensors".to_string()]);
        let registry = config.folder_registry();
        assert_eq!(registry.folders("loras").unwrap().extensions, vec![".safetensors".to_string()]);
        assert_eq!(config.metadata_dir, PathBuf::from("./metadata"));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "similarity_threshold: [not, a, number]").unwrap();
        assert!(LinkerConfig::from_file(&path).is_err());
    }

    #[test]
    fn environment_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("MODEL_LINKER_BIND", "127.0.0.1:1"),
            ("HF_TOKEN", "hf_x"),
            ("CIVITAI_API_KEY", "  "),
        ]
        .into_iter()
        .collect();
        let mut config = LinkerConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.bind_addr, "127.0.0.1:1");
        assert_eq!(config.huggingface_token.as_deref(), Some("hf_x"));
        assert_eq!(config.civitai_api_key, None);
    }

    #[test]
    fn registry_combines_base_and_explicit_categories() {
        let config = LinkerConfig {
            models_base: Some(PathBuf::from("/comfy/models")),
            categories: [(
                "loras".to_string(),
                CategoryFolders { paths: vec!["/extra/loras".into()], extensions: vec![] },
            )]
            .into_iter()
            .collect(),
            ..LinkerConfig::default()
        };
        let registry = config.folder_registry();
        let loras = registry.folders("loras").unwrap();
        assert_eq!(loras.paths, vec![PathBuf::from("/comfy/models/loras"), PathBuf::from("/extra/loras")]);
        assert_eq!(registry.download_directory("lora"), Some(PathBuf::from("/comfy/models/loras")));
    }
}
