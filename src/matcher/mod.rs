// model-linker/src/matcher/mod.rs

pub mod candidates;
pub mod similarity;

pub use candidates::{dedupe_by_path, find_matches, match_missing_entry, order_by_category, CandidateMatch};
pub use similarity::{confidence_from, similarity_ratio};
