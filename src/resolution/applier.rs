// model-linker/src/resolution/applier.rs

use log::{debug, info, warn};
use serde_json::Value;

use crate::workflow_analyzer::subgraphs::{subgraph_nodes_mut, top_level_nodes_mut};
use crate::workflow_analyzer::MissingEntry;

use super::types::Resolution;

/// Counts reported back after applying resolutions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: usize,
    pub skipped: usize,
}

fn target_nodes<'a>(workflow: &'a mut Value, resolution: &Resolution) -> Option<&'a mut Vec<Value>> {
    match (&resolution.subgraph_id, resolution.targets_definition()) {
        (Some(id), true) => subgraph_nodes_mut(workflow, id),
        _ => top_level_nodes_mut(workflow),
    }
}

fn write_slot(workflow: &mut Value, resolution: &Resolution, value: &str) -> bool {
    let Some(nodes) = target_nodes(workflow, resolution) else {
        return false;
    };
    let node = nodes.iter_mut().find(|node| {
        node.get("id")
            .map(|id| resolution.node_id.matches(id))
            .unwrap_or(false)
    });
    let Some(slot) = node
        .and_then(|node| node.get_mut("widgets_values"))
        .and_then(Value::as_array_mut)
        .and_then(|values| values.get_mut(resolution.widget_index))
    else {
        return false;
    };
    *slot = Value::String(value.to_string());
    true
}

/// Rewrites each addressed widget slot in place. Coordinates that no longer
/// exist in the workflow are skipped. Applying the same list again leaves the
/// workflow unchanged.
pub fn apply_resolution(workflow: &mut Value, resolutions: &[Resolution]) -> ApplySummary {
    let mut summary = ApplySummary::default();
    for resolution in resolutions {
        let Some(value) = resolution.slot_value() else {
            warn!(
                "Resolution for node {} slot {} names no path, model or URL; skipping",
                resolution.node_id, resolution.widget_index
            );
            summary.skipped += 1;
            continue;
        };
        if write_slot(workflow, resolution, &value) {
            debug!(
                "Node {} slot {} ({}) -> {}",
                resolution.node_id,
                resolution.widget_index,
                resolution.subgraph_id.as_deref().unwrap_or("top level"),
                value
            );
            summary.applied += 1;
        } else {
            debug!(
                "Node {} slot {} not found, skipping",
                resolution.node_id, resolution.widget_index
            );
            summary.skipped += 1;
        }
    }
    info!(
        "Applied {} resolution(s), skipped {}",
        summary.applied, summary.skipped
    );
    summary
}

/// One resolution per occurrence of the entry's file, all sharing
/// `decision`'s target value.
pub fn expand_entry_resolution(entry: &MissingEntry, decision: &Resolution) -> Vec<Resolution> {
    entry
        .all_node_refs
        .iter()
        .map(|reference| Resolution {
            node_id: reference.node_id.clone(),
            widget_index: reference.widget_index,
            subgraph_id: reference.subgraph_id.clone(),
            is_top_level: Some(reference.is_top_level),
            ..decision.clone()
        })
        .collect()
}
