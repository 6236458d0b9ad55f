// model-linker/src/lib.rs

//! Finds the model files a node-graph workflow references but the local
//! model folders do not contain, ranks local replacements, locates remote
//! sources and downloads them in the background.

pub mod config;
pub mod download_manager;
pub mod error;
pub mod inventory;
pub mod linker;
pub mod logging;
pub mod matcher;
pub mod resolution;
pub mod server;
pub mod sources;
pub mod workflow_analyzer;

pub use config::LinkerConfig;
pub use server::{build_router, serve, AppState, LinkerContext};
