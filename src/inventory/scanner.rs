// model-linker/src/inventory/scanner.rs

use log::{debug, warn};
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use super::folder_registry::{FolderRegistry, MODEL_EXTENSIONS};
use super::path_utils::{absolute_path, lowercase_extension};
use super::types::LocalModel;

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_string_lossy().starts_with('.')
}

fn accepts_extension(filename: &str, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    match lowercase_extension(filename) {
        Some(ext) => extensions.contains(&ext) || MODEL_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// Recursively lists the model files below one root directory.
pub fn scan_directory(directory: &Path, extensions: &[String], category: &str) -> Vec<LocalModel> {
    let mut models = Vec::new();
    if !directory.is_dir() {
        debug!("Directory does not exist or is not accessible: {}", directory.display());
        return models;
    }

    let base_directory = absolute_path(directory);
    let walker = WalkDir::new(&base_directory)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !is_hidden_dir(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error scanning directory {}: {}", base_directory.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().to_string();
        if !accepts_extension(&filename, extensions) {
            continue;
        }

        let full_path = entry.path().to_path_buf();
        // Keep OS-native separators: this is the form the host writes into workflows.
        let relative_path = full_path
            .strip_prefix(&base_directory)
            .map(|rel| rel.to_string_lossy().to_string())
            .unwrap_or_else(|_| filename.clone());

        models.push(LocalModel {
            filename,
            path: full_path,
            relative_path,
            category: category.to_string(),
            base_directory: base_directory.clone(),
        });
    }
    models
}

/// Every model file under every root of every model category.
pub fn scan_all_directories(registry: &FolderRegistry) -> Vec<LocalModel> {
    let mut all_models = Vec::new();
    for (category, folders) in registry.model_categories() {
        for root in &folders.paths {
            let models = scan_directory(root, &folders.extensions, category);
            debug!("Found {} models in {}/{}", models.len(), category, root.display());
            all_models.extend(models);
        }
    }
    all_models
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scan_recurses_and_skips_hidden_directories() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("checkpoints");
        fs::create_dir_all(root.join("sdxl")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("base.safetensors"), b"a").unwrap();
        fs::write(root.join("sdxl/refiner.ckpt"), b"b").unwrap();
        fs::write(root.join(".cache/ghost.safetensors"), b"c").unwrap();
        fs::write(root.join("notes.txt"), b"d").unwrap();

        let mut models = scan_directory(&root, &[".safetensors".to_string()], "checkpoints");
        models.sort_by(|a, b| a.filename.cmp(&b.filename));

        let names: Vec<&str> = models.iter().map(|m| m.filename.as_str()).collect();
        assert_eq!(names, vec!["base.safetensors", "refiner.ckpt"]);
        let refiner = &models[1];
        assert_eq!(
            Path::new(&refiner.relative_path),
            Path::new("sdxl").join("refiner.ckpt").as_path()
        );
        assert_eq!(refiner.category, "checkpoints");
        assert!(refiner.path.is_absolute());
    }

    #[test]
    fn empty_extension_filter_accepts_everything() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"d").unwrap();
        let models = scan_directory(dir.path(), &[], "misc");
        assert_eq!(models.len(), 1);
    }

    #[test]
    fn scan_all_covers_every_category_root() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vae")).unwrap();
        fs::create_dir_all(dir.path().join("loras")).unwrap();
        fs::write(dir.path().join("vae/v.pt"), b"a").unwrap();
        fs::write(dir.path().join("loras/l.safetensors"), b"b").unwrap();

        let registry = FolderRegistry::from_models_base(dir.path());
        let models = scan_all_directories(&registry);
        assert_eq!(models.len(), 2);
        assert!(models.iter().any(|m| m.category == "vae" && m.filename == "v.pt"));
        assert!(models.iter().any(|m| m.category == "loras"));
    }
}
