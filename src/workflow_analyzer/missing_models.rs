// model-linker/src/workflow_analyzer/missing_models.rs

use std::collections::HashMap;

use super::types::{MissingEntry, ModelReference};

/// Groups the references whose file does not exist by their raw filename.
///
/// The first reference seen for a filename becomes the entry's base record;
/// every occurrence (including the first) lands in `all_node_refs`, so one
/// resolution decision can patch every node that uses the file.
pub fn identify_missing_models(workflow_models: &[ModelReference]) -> Vec<MissingEntry> {
    let mut entries: Vec<MissingEntry> = Vec::new();
    let mut by_filename: HashMap<&str, usize> = HashMap::new();

    for model_ref in workflow_models.iter().filter(|r| !r.exists) {
        match by_filename.get(model_ref.original_path.as_str()) {
            Some(&index) => {
                let entry = &mut entries[index];
                let already_listed = entry.all_node_refs.iter().any(|r| same_slot(r, model_ref));
                if !already_listed {
                    entry.all_node_refs.push(model_ref.clone());
                }
            }
            None => {
                by_filename.insert(model_ref.original_path.as_str(), entries.len());
                entries.push(MissingEntry::new(model_ref.clone()));
            }
        }
    }
    entries
}

fn same_slot(a: &ModelReference, b: &ModelReference) -> bool {
    a.node_id.same_node(&b.node_id)
        && a.widget_index == b.widget_index
        && a.subgraph_id == b.subgraph_id
        && a.is_top_level == b.is_top_level
}
