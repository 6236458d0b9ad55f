// model-linker/src/inventory/mod.rs

pub mod folder_registry;
pub mod path_utils;
pub mod scanner;
pub mod types;

pub use folder_registry::{FolderRegistry, ModelLookup, MODEL_EXTENSIONS};
pub use scanner::{scan_all_directories, scan_directory};
pub use types::{CategoryFolders, LocalModel};
