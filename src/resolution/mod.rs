// model-linker/src/resolution/mod.rs

pub mod applier;
pub mod types;

pub use applier::{apply_resolution, expand_entry_resolution, ApplySummary};
pub use types::Resolution;
