// model-linker/src/inventory/types.rs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A model file found on disk under one of the registry's category roots.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocalModel {
    pub filename: String,
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Path relative to `base_directory`, using OS-native separators.
    pub relative_path: String,
    pub category: String,
    /// The scan root this file was found under.
    pub base_directory: PathBuf,
}

/// Roots and accepted extensions for one category.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CategoryFolders {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub extensions: Vec<String>, // lower-case with leading dot once registered; empty accepts every file
}
