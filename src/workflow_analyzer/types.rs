// model-linker/src/workflow_analyzer/types.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use crate::matcher::CandidateMatch;
use crate::sources::RemoteSource;

/// Node identifiers are integers in saved workflows but arrive as strings
/// from some frontends; both spellings address the same node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Text(String),
}

impl NodeId {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(NodeId::Int),
            Value::String(s) => Some(NodeId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            NodeId::Int(id) => Value::from(*id),
            NodeId::Text(id) => Value::from(id.as_str()),
        }
    }

    /// `5` and `"5"` are the same node.
    pub fn same_node(&self, other: &NodeId) -> bool {
        self.matches(&other.to_value())
    }

    /// True when the JSON id of a node denotes this id.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (NodeId::Int(id), Value::Number(n)) => n.as_i64() == Some(*id),
            (NodeId::Int(id), Value::String(s)) => s.trim() == id.to_string(),
            (NodeId::Text(id), Value::String(s)) => s == id,
            (NodeId::Text(id), Value::Number(n)) => n.to_string() == id.trim(),
            _ => false,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Int(id) => write!(f, "{}", id),
            NodeId::Text(id) => write!(f, "{}", id),
        }
    }
}

/// One occurrence of a model filename in a node's widget values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelReference {
    pub node_id: NodeId,
    pub node_type: String,
    pub widget_index: usize,
    /// The value exactly as stored in the workflow.
    pub original_path: String,
    /// Registry category, the node's hint, or "unknown".
    pub category: String,
    pub full_path: Option<PathBuf>,
    pub exists: bool,
    pub subgraph_id: Option<String>,
    pub subgraph_name: Option<String>,
    /// `["definitions", "subgraphs", <id>, "nodes"]` for nodes inside a
    /// subgraph definition, `None` for top-level nodes.
    pub subgraph_path: Option<Vec<String>>,
    pub is_top_level: bool,
}

/// Where a workflow URL was discovered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UrlSource {
    /// A node's `properties.models` list.
    NodeProperties,
    /// Pattern match over the serialized workflow text.
    Regex,
    #[default]
    None,
}

/// URL harvested from the workflow for one filename.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WorkflowUrl {
    pub url: String,
    pub directory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    pub source: UrlSource,
}

/// One distinct missing filename together with every node that needs it.
#[derive(Serialize, Debug, Clone)]
pub struct MissingEntry {
    #[serde(flatten)]
    pub reference: ModelReference,
    pub all_node_refs: Vec<ModelReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_directory: Option<String>,
    pub url_source: UrlSource,
    pub matches: Vec<CandidateMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_source: Option<RemoteSource>,
}

impl MissingEntry {
    pub fn new(reference: ModelReference) -> Self {
        Self {
            all_node_refs: vec![reference.clone()],
            reference,
            workflow_url: None,
            workflow_directory: None,
            url_source: UrlSource::None,
            matches: Vec::new(),
            download_source: None,
        }
    }

    pub fn filename(&self) -> &str {
        &self.reference.original_path
    }

    pub fn has_perfect_match(&self) -> bool {
        self.matches.iter().any(|m| m.confidence == 100)
    }
}

/// Response body of the analysis.
#[derive(Serialize, Debug, Clone)]
pub struct AnalysisResult {
    pub missing_models: Vec<MissingEntry>,
    pub total_missing: usize,
    pub total_models_analyzed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_id_matches_both_spellings() {
        assert!(NodeId::Int(5).matches(&json!(5)));
        assert!(NodeId::Int(5).matches(&json!("5")));
        assert!(NodeId::Text("5".into()).matches(&json!(5)));
        assert!(NodeId::Text("a:1".into()).matches(&json!("a:1")));
        assert!(!NodeId::Int(5).matches(&json!(6)));
        assert!(!NodeId::Int(5).matches(&json!(null)));
    }

    #[test]
    fn node_id_deserializes_untagged() {
        let id: NodeId = serde_json::from_value(json!(12)).unwrap();
        assert_eq!(id, NodeId::Int(12));
        let id: NodeId = serde_json::from_value(json!("12")).unwrap();
        assert_eq!(id, NodeId::Text("12".into()));
    }
}
