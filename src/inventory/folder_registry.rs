// model-linker/src/inventory/folder_registry.rs

use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::path_utils::{absolute_path, plain_relative_path};
use super::types::CategoryFolders;

/// Extensions treated as model files everywhere in the linker.
pub const MODEL_EXTENSIONS: &[&str] = &[
    ".ckpt", ".pt", ".pt2", ".bin", ".pth", ".safetensors", ".pkl", ".sft", ".onnx",
];

/// Registry entries that hold no model files.
pub const SKIPPED_CATEGORIES: &[&str] = &["custom_nodes", "configs"];

/// Categories created under `models_base` when the config names one.
pub const STANDARD_CATEGORIES: &[&str] = &[
    "checkpoints",
    "loras",
    "vae",
    "controlnet",
    "clip",
    "clip_vision",
    "embeddings",
    "upscale_models",
    "diffusion_models",
    "text_encoders",
    "ipadapter",
    "sams",
    "hypernetworks",
    "style_models",
    "gligen",
    "photomaker",
];

/// Categories reported by the directories listing.
pub const DIRECTORY_CATEGORIES: &[&str] = &[
    "checkpoints",
    "loras",
    "vae",
    "controlnet",
    "clip",
    "clip_vision",
    "embeddings",
    "upscale_models",
    "diffusion_models",
    "text_encoders",
    "ipadapter",
    "sams",
];

/// Answers "does this workflow value resolve to a file on disk?".
///
/// `category_hint` narrows the probe to one category; without a hint every
/// model category is tried in registry order.
pub trait ModelLookup: Send + Sync {
    fn resolve(&self, value: &str, category_hint: Option<&str>) -> Option<(String, PathBuf)>;
}

/// Category name -> root directories + accepted extensions.
#[derive(Debug, Clone, Default)]
pub struct FolderRegistry {
    categories: Vec<(String, CategoryFolders)>,
}

impl FolderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard ComfyUI layout: every category lives in `<base>/<category>`.
    /// `unet` folders are folded into `diffusion_models` like ComfyUI does.
    pub fn from_models_base(base: &Path) -> Self {
        let mut registry = Self::new();
        registry.add_models_base(base);
        registry
    }

    pub fn add_models_base(&mut self, base: &Path) {
        info!("Registering standard model categories under {}", base.display());
        for category in STANDARD_CATEGORIES {
            self.add_category(category, vec![base.join(category)], Vec::new());
        }
        self.add_category("diffusion_models", vec![base.join("unet")], Vec::new());
        self.add_category("text_encoders", vec![base.join("clip")], Vec::new());
    }

    /// Adds roots to `category`, creating it when unknown. Roots already
    /// registered for the category are not duplicated.
    pub fn add_category(&mut self, category: &str, paths: Vec<PathBuf>, extensions: Vec<String>) {
        let extensions: Vec<String> = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.to_lowercase();
                if ext.starts_with('.') { ext } else { format!(".{}", ext) }
            })
            .collect();

        let index = match self.categories.iter().position(|(name, _)| name == category) {
            Some(index) => index,
            None => {
                self.categories.push((category.to_string(), CategoryFolders::default()));
                self.categories.len() - 1
            }
        };
        let folders = &mut self.categories[index].1;
        for path in paths {
            let path = absolute_path(&path);
            if !folders.paths.contains(&path) {
                debug!("Category {} -> {}", category, path.display());
                folders.paths.push(path);
            }
        }
        for ext in extensions {
            if !folders.extensions.contains(&ext) {
                folders.extensions.push(ext);
            }
        }
    }

    pub fn folders(&self, category: &str) -> Option<&CategoryFolders> {
        self.categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, folders)| folders)
    }

    /// Categories that can contain model files, in registry order.
    pub fn model_categories(&self) -> impl Iterator<Item = (&str, &CategoryFolders)> {
        self.categories
            .iter()
            .filter(|(name, _)| !SKIPPED_CATEGORIES.contains(&name.as_str()))
            .map(|(name, folders)| (name.as_str(), folders))
    }

    /// Maps loose category spellings ("lora", "unet", "upscaler", ...) onto
    /// registry keys. Unknown names are only lower-cased.
    pub fn canonical_category(category: &str) -> String {
        let lowered = category.to_lowercase();
        let canonical = match lowered.as_str() {
            "checkpoint" => "checkpoints",
            "lora" => "loras",
            "upscaler" => "upscale_models",
            "embedding" => "embeddings",
            "unet" => "diffusion_models",
            "text_encoder" => "text_encoders",
            "ip-adapter" => "ipadapter",
            _ => return lowered,
        };
        canonical.to_string()
    }

    /// First root of the category, where new downloads are written.
    pub fn download_directory(&self, category: &str) -> Option<PathBuf> {
        let key = Self::canonical_category(category);
        self.folders(&key).and_then(|folders| folders.paths.first().cloned())
    }

    /// Fixed category list mapped to its download directory; categories
    /// without a configured root are omitted.
    pub fn directories(&self) -> BTreeMap<String, PathBuf> {
        DIRECTORY_CATEGORIES
            .iter()
            .filter_map(|category| {
                self.download_directory(category)
                    .map(|dir| (category.to_string(), dir))
            })
            .collect()
    }
}

impl ModelLookup for FolderRegistry {
    fn resolve(&self, value: &str, category_hint: Option<&str>) -> Option<(String, PathBuf)> {
        let filename = value.trim();
        if filename.is_empty() {
            return None;
        }
        let Some(relative) = plain_relative_path(filename) else {
            debug!("Ignoring model path outside the model roots: {}", filename);
            return None;
        };

        for (category, folders) in self.model_categories() {
            if let Some(hint) = category_hint {
                if hint != category {
                    continue;
                }
            }
            for root in &folders.paths {
                let candidate = root.join(&relative);
                if candidate.is_file() {
                    return Some((category.to_string(), candidate));
                }
            }
        }
        None
    }
}
