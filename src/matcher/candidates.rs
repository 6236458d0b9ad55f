// model-linker/src/matcher/candidates.rs

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::inventory::path_utils::{file_name_of, normalize_path};
use crate::inventory::LocalModel;
use crate::workflow_analyzer::{category_hint_for, MissingEntry};

use super::similarity::{confidence_from, similarity_ratio};

/// A local file proposed as a replacement for a missing reference.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    pub model: LocalModel,
    pub filename: String,
    pub similarity: f64,
    pub confidence: u8,
}

/// Every local model, files of `category` first. Relative order inside each
/// group is the inventory order.
pub fn order_by_category<'a>(available: &'a [LocalModel], category: &str) -> Vec<&'a LocalModel> {
    let (mut preferred, others): (Vec<&LocalModel>, Vec<&LocalModel>) =
        available.iter().partition(|model| model.category == category);
    preferred.extend(others);
    preferred
}

/// Candidates at or above `threshold`, best first, at most `max_results`.
pub fn find_matches(
    target_filename: &str,
    candidates: &[&LocalModel],
    threshold: f64,
    max_results: usize,
) -> Vec<CandidateMatch> {
    let target = file_name_of(target_filename);

    let mut matches: Vec<CandidateMatch> = candidates
        .iter()
        .filter_map(|model| {
            let similarity = similarity_ratio(target, &model.filename);
            if similarity < threshold {
                return None;
            }
            Some(CandidateMatch {
                model: (*model).clone(),
                filename: model.filename.clone(),
                similarity,
                confidence: confidence_from(similarity),
            })
        })
        .collect();

    // Stable: equal scores keep the category-first order.
    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches.truncate(max_results);
    matches
}

/// Collapses matches that point at the same file. The first match for a path
/// stays unless a later one has a strictly higher confidence.
pub fn dedupe_by_path(matches: Vec<CandidateMatch>) -> Vec<CandidateMatch> {
    let mut kept: Vec<(PathBuf, CandidateMatch)> = Vec::with_capacity(matches.len());
    for candidate in matches {
        let key = normalize_path(&candidate.model.path);
        match kept.iter_mut().find(|(path, _)| *path == key) {
            Some((_, existing)) => {
                if candidate.confidence > existing.confidence {
                    *existing = candidate;
                }
            }
            None => kept.push((key, candidate)),
        }
    }
    kept.into_iter().map(|(_, candidate)| candidate).collect()
}

/// Ranked, path-unique local candidates for one missing entry.
pub fn match_missing_entry(
    entry: &MissingEntry,
    available: &[LocalModel],
    threshold: f64,
    max_results: usize,
) -> Vec<CandidateMatch> {
    let category = if entry.reference.category == "unknown" {
        category_hint_for(&entry.reference.node_type).unwrap_or("unknown")
    } else {
        entry.reference.category.as_str()
    };
    let pool = order_by_category(available, category);
    let matches = dedupe_by_path(find_matches(entry.filename(), &pool, threshold, max_results));
    debug!(
        "{} candidate(s) for {} (category {})",
        matches.len(),
        entry.filename(),
        category
    );
    matches
}
