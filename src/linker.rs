// model-linker/src/linker.rs

use log::{debug, info};
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::download_manager::{authorize, Credentials};
use crate::inventory::path_utils::file_name_of;
use crate::inventory::{LocalModel, ModelLookup};
use crate::matcher::match_missing_entry;
use crate::sources::{MatchKind, RemoteSource, SourceChain, SourceKind};
use crate::workflow_analyzer::{
    analyze_workflow_models,
    extract_workflow_urls,
    identify_missing_models,
    AnalysisResult,
    MissingEntry,
    WorkflowUrl,
};

const SIZE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub similarity_threshold: f64,
    pub max_matches_per_model: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { similarity_threshold: 0.0, max_matches_per_model: 10 }
    }
}

fn attach_workflow_url(entry: &mut MissingEntry, urls: &HashMap<String, WorkflowUrl>) {
    let Some(found) = urls.get(file_name_of(entry.filename())) else {
        return;
    };
    entry.workflow_url = Some(found.url.clone()).filter(|u| !u.is_empty());
    entry.workflow_directory = Some(found.directory.clone()).filter(|d| !d.is_empty());
    entry.url_source = found.source;
}

/// Missing references of the workflow, each with its embedded URL (if any)
/// and ranked local replacement candidates.
pub fn analyze_and_find_matches(
    workflow: &Value,
    lookup: &dyn ModelLookup,
    available: &[LocalModel],
    options: MatchOptions,
) -> AnalysisResult {
    let workflow_urls = extract_workflow_urls(workflow);
    let references = analyze_workflow_models(workflow, lookup);
    let mut missing = identify_missing_models(&references);

    for entry in &mut missing {
        attach_workflow_url(entry, &workflow_urls);
        entry.matches = match_missing_entry(
            entry,
            available,
            options.similarity_threshold,
            options.max_matches_per_model,
        );
    }

    info!(
        "Workflow analysis: {} model reference(s), {} missing, {} local file(s) considered",
        references.len(),
        missing.len(),
        available.len()
    );
    AnalysisResult {
        total_missing: missing.len(),
        total_models_analyzed: references.len(),
        missing_models: missing,
    }
}

/// Size announced by a HEAD request, if the server answers in time.
pub async fn probe_size(client: &Client, url: &str, credentials: &Credentials) -> Option<u64> {
    let authorized = authorize(url, credentials);
    let mut request = client.head(&authorized.url).timeout(SIZE_PROBE_TIMEOUT);
    if let Some(token) = &authorized.bearer {
        request = request.bearer_auth(token);
    }
    let response = match request.send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            debug!("HEAD {} returned {}", url, response.status());
            return None;
        }
        Err(e) => {
            debug!("HEAD {} failed: {}", url, e);
            return None;
        }
    };
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Chooses one remote source for every entry that has no perfect local
/// match: the URL embedded in the workflow when there is one, otherwise
/// the first exact hit of the source chain.
pub async fn attach_download_sources(
    result: &mut AnalysisResult,
    chain: &SourceChain,
    client: &Client,
    credentials: &Credentials,
) {
    for entry in result.missing_models.iter_mut() {
        if entry.has_perfect_match() {
            continue;
        }
        let filename = file_name_of(entry.filename()).to_string();

        let mut source = match entry.workflow_url.clone() {
            Some(url) => {
                let mut source = RemoteSource::new(SourceKind::from_url(&url), &filename, &url, MatchKind::Workflow);
                source.directory = entry.workflow_directory.clone();
                source.size = probe_size(client, &url, credentials).await;
                Some(source)
            }
            None => chain.find_exact(&filename).await,
        };

        if let Some(source) = source.as_mut() {
            if source.directory.is_none() && entry.reference.category != "unknown" {
                source.directory = Some(entry.reference.category.clone());
            }
            debug!("Download source for {}: {:?} {}", filename, source.source, source.url);
        }
        entry.download_source = source;
    }
}
