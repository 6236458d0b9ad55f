// model-linker/src/workflow_analyzer/extractor.rs

use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;

use crate::inventory::path_utils::lowercase_extension;
use crate::inventory::{ModelLookup, MODEL_EXTENSIONS};

use super::node_kinds::category_hint_for;
use super::subgraphs::{subgraph_definitions, top_level_nodes};
use super::types::{ModelReference, NodeId};

/// Where the node being analysed sits in the document.
#[derive(Debug, Clone, Default)]
pub struct NodeLocation {
    pub subgraph_id: Option<String>,
    pub subgraph_name: Option<String>,
    pub subgraph_path: Option<Vec<String>>,
    pub is_top_level: bool,
}

impl NodeLocation {
    fn top_level(subgraph: Option<(&str, &str)>) -> Self {
        Self {
            subgraph_id: subgraph.map(|(id, _)| id.to_string()),
            subgraph_name: subgraph.map(|(_, name)| name.to_string()),
            subgraph_path: None,
            is_top_level: true,
        }
    }

    fn in_definition(id: &str, name: &str) -> Self {
        Self {
            subgraph_id: Some(id.to_string()),
            subgraph_name: Some(name.to_string()),
            subgraph_path: Some(vec![
                "definitions".to_string(),
                "subgraphs".to_string(),
                id.to_string(),
                "nodes".to_string(),
            ]),
            is_top_level: false,
        }
    }
}

/// Case-insensitive model-extension suffix test.
pub fn is_model_filename(value: &Value) -> bool {
    match value.as_str() {
        Some(s) => lowercase_extension(s)
            .map(|ext| MODEL_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false),
        None => false,
    }
}

/// Model references held in one node's `widgets_values`.
pub fn get_node_model_info(
    node: &Value,
    location: &NodeLocation,
    lookup: &dyn ModelLookup,
) -> Result<Vec<ModelReference>, String> {
    let node_obj = node
        .as_object()
        .ok_or_else(|| format!("node is not an object: {}", node))?;
    let node_id = node_obj
        .get("id")
        .and_then(NodeId::from_value)
        .ok_or_else(|| "node has no usable id".to_string())?;
    let node_type = node_obj.get("type").and_then(Value::as_str).unwrap_or("");

    let widgets_values = match node_obj.get("widgets_values") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(values)) => values,
        Some(other) => {
            // Some custom nodes store a keyed object here; it has no positional slots to relink.
            debug!("Node {} keeps non-positional widgets_values ({}), skipping", node_id, type_name(other));
            return Ok(Vec::new());
        }
    };

    let category_hint = category_hint_for(node_type);
    let mut model_refs = Vec::new();

    for (idx, value) in widgets_values.iter().enumerate() {
        if !is_model_filename(value) {
            continue;
        }
        let original_path = value.as_str().unwrap_or_default().to_string();

        let (category, full_path, exists) = match lookup.resolve(&original_path, category_hint) {
            Some((category, full_path)) => (category, Some(full_path), true),
            None => (category_hint.unwrap_or("unknown").to_string(), None, false),
        };

        model_refs.push(ModelReference {
            node_id: node_id.clone(),
            node_type: node_type.to_string(),
            widget_index: idx,
            original_path,
            category,
            full_path,
            exists,
            subgraph_id: location.subgraph_id.clone(),
            subgraph_name: location.subgraph_name.clone(),
            subgraph_path: location.subgraph_path.clone(),
            is_top_level: location.is_top_level,
        });
    }
    Ok(model_refs)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// All model references in the workflow: top-level nodes first, then the
/// nodes of every subgraph definition in declaration order. A node that
/// cannot be analysed is logged and skipped.
pub fn analyze_workflow_models(workflow: &Value, lookup: &dyn ModelLookup) -> Vec<ModelReference> {
    let definitions = subgraph_definitions(workflow);
    let subgraph_names: HashMap<&str, &str> = definitions
        .iter()
        .map(|def| (def.id.as_str(), def.name.as_str()))
        .collect();

    let mut all_model_refs = Vec::new();

    for node in top_level_nodes(workflow) {
        let node_type = node.get("type").and_then(Value::as_str).unwrap_or("");
        // A top-level node whose type is a subgraph id is an instance of that subgraph.
        let instance_of = subgraph_names
            .get_key_value(node_type)
            .map(|(id, name)| (*id, *name));
        let location = NodeLocation::top_level(instance_of);

        match get_node_model_info(node, &location, lookup) {
            Ok(refs) => all_model_refs.extend(refs),
            Err(e) => warn!("Error analyzing node {}: {}", describe_node(node), e),
        }
    }

    for def in &definitions {
        debug!("Analyzing subgraph: {} (ID: {}) with {} nodes", def.name, def.id, def.nodes.len());
        let location = NodeLocation::in_definition(&def.id, &def.name);
        for node in def.nodes {
            match get_node_model_info(node, &location, lookup) {
                Ok(refs) => all_model_refs.extend(refs),
                Err(e) => warn!(
                    "Error analyzing subgraph {} node {}: {}",
                    def.id,
                    describe_node(node),
                    e
                ),
            }
        }
    }

    all_model_refs
}

fn describe_node(node: &Value) -> String {
    node.get("id")
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::path::PathBuf;

    /// Lookup over a fixed set of (category, filename) pairs.
    pub(crate) struct StaticLookup(pub HashSet<(String, String)>);

    impl ModelLookup for StaticLookup {
        fn resolve(&self, value: &str, hint: Option<&str>) -> Option<(String, PathBuf)> {
            self.0
                .iter()
                .find(|(cat, name)| name == value && hint.map_or(true, |h| h == cat))
                .map(|(cat, name)| (cat.clone(), PathBuf::from("/models").join(cat).join(name)))
        }
    }

    fn lookup(items: &[(&str, &str)]) -> StaticLookup {
        StaticLookup(
            items
                .iter()
                .map(|(c, n)| (c.to_string(), n.to_string()))
                .collect(),
        )
    }

    #[test]
    fn model_filename_detection_is_case_insensitive() {
        assert!(is_model_filename(&json!("A.SafeTensors")));
        assert!(is_model_filename(&json!("dir/model.pt2")));
        assert!(!is_model_filename(&json!("euler")));
        assert!(!is_model_filename(&json!(20)));
    }

    #[test]
    fn node_refs_keep_slot_and_hint_category() {
        let node = json!({
            "id": 4, "type": "CheckpointLoaderSimple",
            "widgets_values": ["missing.safetensors", 7, "present.ckpt"]
        });
        let refs = get_node_model_info(
            &node,
            &NodeLocation::top_level(None),
            &lookup(&[("checkpoints", "present.ckpt")]),
        )
        .unwrap();

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].widget_index, 0);
        assert!(!refs[0].exists);
        assert_eq!(refs[0].category, "checkpoints");
        assert_eq!(refs[1].widget_index, 2);
        assert!(refs[1].exists);
        assert!(refs[1].full_path.is_some());
    }

    #[test]
    fn hinted_category_does_not_fall_back_to_others() {
        let node = json!({"id": 1, "type": "LoraLoader", "widgets_values": ["x.safetensors"]});
        let refs = get_node_model_info(
            &node,
            &NodeLocation::top_level(None),
            &lookup(&[("checkpoints", "x.safetensors")]),
        )
        .unwrap();
        assert!(!refs[0].exists);
        assert_eq!(refs[0].category, "loras");
    }

    #[test]
    fn unknown_node_type_without_match_is_unknown() {
        let node = json!({"id": 1, "type": "CustomThing", "widgets_values": ["y.pth"]});
        let refs = get_node_model_info(&node, &NodeLocation::top_level(None), &lookup(&[])).unwrap();
        assert_eq!(refs[0].category, "unknown");
    }

    #[test]
    fn workflow_walk_marks_instances_and_definitions() {
        let workflow = json!({
            "nodes": [
                {"id": 1, "type": "CheckpointLoaderSimple", "widgets_values": ["a.safetensors"]},
                {"id": 2, "type": "sg-1", "widgets_values": ["b.safetensors"]},
                "garbage",
                {"id": 3, "type": "Note", "widgets_values": {"text": "c.safetensors"}}
            ],
            "definitions": {"subgraphs": [
                {"id": "sg-1", "name": "Upscale", "nodes": [
                    {"id": 1, "type": "UpscaleModelLoader", "widgets_values": ["4x.pth"]}
                ]}
            ]}
        });
        let refs = analyze_workflow_models(&workflow, &lookup(&[]));
        assert_eq!(refs.len(), 3);

        assert!(refs[0].is_top_level);
        assert_eq!(refs[0].subgraph_id, None);

        assert!(refs[1].is_top_level);
        assert_eq!(refs[1].subgraph_id.as_deref(), Some("sg-1"));
        assert_eq!(refs[1].subgraph_name.as_deref(), Some("Upscale"));
        assert_eq!(refs[1].subgraph_path, None);

        assert!(!refs[2].is_top_level);
        assert_eq!(refs[2].subgraph_id.as_deref(), Some("sg-1"));
        assert_eq!(refs[2].category, "upscale_models");
        assert_eq!(
            refs[2].subgraph_path.as_ref().unwrap(),
            &vec!["definitions", "subgraphs", "sg-1", "nodes"]
        );
    }
}
