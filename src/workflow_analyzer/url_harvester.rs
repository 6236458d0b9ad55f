// model-linker/src/workflow_analyzer/url_harvester.rs

use log::{debug, error};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::inventory::path_utils::strip_extension;

use super::subgraphs::{subgraph_definitions, top_level_nodes};
use super::types::{UrlSource, WorkflowUrl};

// Only the two hosting sites the downloader knows how to authenticate against.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://(?:huggingface\.co|civitai\.com)[^\s"'<>)\\]+"#).expect("valid url pattern")
});

// `pth` is listed before `pt` so "x.pth" is not cut short to "x.pt".
static MODEL_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\w\-.%]+\.(?:safetensors|ckpt|pth|pt|bin|onnx)").expect("valid model file pattern")
});

fn percent_decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Pass 1: `properties.models` entries on every node. First name wins.
fn harvest_node_properties(workflow: &Value, url_map: &mut HashMap<String, WorkflowUrl>) {
    let definitions = subgraph_definitions(workflow);
    let all_nodes = top_level_nodes(workflow)
        .iter()
        .chain(definitions.iter().flat_map(|def| def.nodes.iter()));

    for node in all_nodes {
        let node_type = node.get("type").and_then(Value::as_str).unwrap_or("");
        let models = match node
            .get("properties")
            .and_then(|props| props.get("models"))
            .and_then(Value::as_array)
        {
            Some(models) => models,
            None => continue,
        };

        for model_info in models {
            let field = |key: &str| {
                model_info
                    .get(key)
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string()
            };
            let name = field("name");
            if name.is_empty() || url_map.contains_key(&name) {
                continue;
            }
            url_map.insert(
                name,
                WorkflowUrl {
                    url: field("url"),
                    directory: field("directory"),
                    node_type: Some(node_type.to_string()),
                    source: UrlSource::NodeProperties,
                },
            );
        }
    }
}

fn clean_urls(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .filter_map(|m| {
            let url = m
                .as_str()
                .split(')')
                .next()
                .unwrap_or("")
                .replace("\\n", "")
                .replace('\n', "");
            let url = url.trim();
            if url.is_empty() { None } else { Some(url.to_string()) }
        })
        .collect()
}

/// Model filenames mentioned anywhere in the text, as (decoded, original)
/// pairs in first-seen order.
fn mentioned_filenames(text: &str) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for m in MODEL_FILE_PATTERN.find_iter(text) {
        let cleaned = m.as_str().trim();
        let starts_alnum = cleaned.chars().next().map_or(false, char::is_alphanumeric);
        if !starts_alnum {
            continue;
        }
        let decoded = percent_decode(cleaned);
        if seen.insert(decoded.clone()) {
            files.push((decoded, cleaned.to_string()));
        }
    }
    files
}

/// First URL that mentions the file: decoded name, then original name, then
/// the name without its extension.
fn find_url_for<'a>(decoded: &str, original: &str, urls: &'a [String]) -> Option<&'a String> {
    let base = strip_extension(decoded);
    let decoded_base = percent_decode(base);
    urls.iter().find(|url| {
        url.contains(decoded)
            || url.contains(original)
            || url.contains(base)
            || url.contains(decoded_base.as_str())
    })
}

/// Pass 2: URLs and filenames pattern-matched over the serialized workflow.
/// Never replaces a URL found by pass 1.
fn harvest_text_matches(workflow: &Value, url_map: &mut HashMap<String, WorkflowUrl>) {
    let text = match serde_json::to_string(workflow) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize workflow for URL extraction: {}", e);
            return;
        }
    };

    let urls = clean_urls(&text);
    if urls.is_empty() {
        return;
    }

    for (decoded, original) in mentioned_filenames(&text) {
        if url_map.get(&decoded).map_or(false, |entry| !entry.url.is_empty()) {
            continue;
        }
        let Some(url) = find_url_for(&decoded, &original, &urls) else {
            continue;
        };
        match url_map.get_mut(&decoded) {
            Some(entry) => {
                entry.url = url.clone();
                entry.source = UrlSource::Regex;
            }
            None => {
                url_map.insert(
                    decoded,
                    WorkflowUrl {
                        url: url.clone(),
                        directory: String::new(),
                        node_type: None,
                        source: UrlSource::Regex,
                    },
                );
            }
        }
    }
}

/// Filename -> download URL embedded in the workflow.
pub fn extract_workflow_urls(workflow: &Value) -> HashMap<String, WorkflowUrl> {
    let mut url_map = HashMap::new();
    harvest_node_properties(workflow, &mut url_map);
    harvest_text_matches(workflow, &mut url_map);
    debug!("Extracted {} URLs from workflow", url_map.len());
    url_map
}
