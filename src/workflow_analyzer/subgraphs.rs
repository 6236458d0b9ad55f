// model-linker/src/workflow_analyzer/subgraphs.rs

use log::warn;
use serde_json::Value;
use std::collections::HashSet;

/// A subgraph definition found under some `definitions.subgraphs` list.
#[derive(Debug, Clone)]
pub struct SubgraphDef<'a> {
    pub id: String,
    pub name: String,
    pub nodes: &'a [Value],
    /// Positions inside each nested `definitions.subgraphs` list, outermost
    /// first. Used to walk back to the definition mutably.
    pub index_path: Vec<usize>,
}

fn nested_definitions(container: &Value) -> &[Value] {
    container
        .get("definitions")
        .and_then(|defs| defs.get("subgraphs"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Top-level node list of a workflow (empty when absent).
pub fn top_level_nodes(workflow: &Value) -> &[Value] {
    workflow
        .get("nodes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Every subgraph definition in declaration order, including definitions
/// nested inside other definitions. A definition id is visited once; repeats
/// (malformed or self-referencing documents) are skipped.
pub fn subgraph_definitions(workflow: &Value) -> Vec<SubgraphDef<'_>> {
    let mut found = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<(&Value, Vec<usize>)> = nested_definitions(workflow)
        .iter()
        .enumerate()
        .rev()
        .map(|(idx, sg)| (sg, vec![idx]))
        .collect();

    while let Some((subgraph, index_path)) = stack.pop() {
        let id = match subgraph.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                warn!("Skipping subgraph definition without an id at {:?}", index_path);
                continue;
            }
        };
        if !visited.insert(id.clone()) {
            warn!("Subgraph {} is defined more than once; ignoring repeat at {:?}", id, index_path);
            continue;
        }

        let name = subgraph
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        let nodes = subgraph
            .get("nodes")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        for (idx, nested) in nested_definitions(subgraph).iter().enumerate().rev() {
            let mut nested_path = index_path.clone();
            nested_path.push(idx);
            stack.push((nested, nested_path));
        }

        found.push(SubgraphDef { id, name, nodes, index_path });
    }
    found
}

/// Mutable node list of the subgraph definition with `subgraph_id`.
pub fn subgraph_nodes_mut<'a>(workflow: &'a mut Value, subgraph_id: &str) -> Option<&'a mut Vec<Value>> {
    let index_path = subgraph_definitions(workflow)
        .into_iter()
        .find(|def| def.id == subgraph_id)?
        .index_path;

    let mut current = workflow;
    for idx in index_path {
        current = current
            .get_mut("definitions")?
            .get_mut("subgraphs")?
            .get_mut(idx)?;
    }
    current.get_mut("nodes")?.as_array_mut()
}

/// Mutable top-level node list.
pub fn top_level_nodes_mut(workflow: &mut Value) -> Option<&mut Vec<Value>> {
    workflow.get_mut("nodes")?.as_array_mut()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definitions_walk_in_declaration_order_with_nesting() {
        let workflow = json!({
            "nodes": [],
            "definitions": {"subgraphs": [
                {"id": "a", "name": "A", "nodes": [{"id": 1}],
                 "definitions": {"subgraphs": [{"id": "a1", "nodes": [{"id": 2}]}]}},
                {"id": "b", "nodes": []}
            ]}
        });
        let defs = subgraph_definitions(&workflow);
        let ids: Vec<&str> = defs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a1", "b"]);
        assert_eq!(defs[0].name, "A");
        assert_eq!(defs[1].name, "a1");
        assert_eq!(defs[1].index_path, vec![0, 0]);
        assert_eq!(defs[1].nodes.len(), 1);
    }

    #[test]
    fn repeated_ids_are_visited_once() {
        let workflow = json!({"definitions": {"subgraphs": [
            {"id": "loop", "nodes": [{"id": 1}],
             "definitions": {"subgraphs": [{"id": "loop", "nodes": [{"id": 9}]}]}},
            {"nodes": []}
        ]}});
        let defs = subgraph_definitions(&workflow);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].nodes[0]["id"], json!(1));
    }

    #[test]
    fn nested_nodes_are_reachable_mutably() {
        let mut workflow = json!({"definitions": {"subgraphs": [
            {"id": "a", "nodes": [],
             "definitions": {"subgraphs": [{"id": "a1", "nodes": [{"id": 2}]}]}}
        ]}});
        let nodes = subgraph_nodes_mut(&mut workflow, "a1").unwrap();
        nodes[0]["widgets_values"] = json!(["x.safetensors"]);
        assert_eq!(
            workflow["definitions"]["subgraphs"][0]["definitions"]["subgraphs"][0]["nodes"][0]["widgets_values"][0],
            json!("x.safetensors")
        );
        assert!(subgraph_nodes_mut(&mut workflow, "missing").is_none());
    }
}
