// model-linker/src/resolution/types.rs

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::download_manager::request_auth::filename_from_url;
use crate::inventory::LocalModel;
use crate::workflow_analyzer::NodeId;

/// The caller's fix for one slot of one node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Resolution {
    pub node_id: NodeId,
    pub widget_index: usize,
    #[serde(default)]
    pub subgraph_id: Option<String>,
    /// `Some(false)` addresses a node inside a subgraph definition.
    #[serde(default)]
    pub is_top_level: Option<bool>,
    #[serde(default)]
    pub resolved_path: Option<String>,
    #[serde(default)]
    pub resolved_model: Option<LocalModel>,
    #[serde(default)]
    pub category: Option<String>,
    /// Remote resolution: the file will be fetched into `category`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub subfolder: Option<String>,
}

impl Resolution {
    pub fn local(node_id: NodeId, widget_index: usize, model: LocalModel) -> Self {
        Self {
            node_id,
            widget_index,
            subgraph_id: None,
            is_top_level: None,
            resolved_path: None,
            category: Some(model.category.clone()),
            resolved_model: Some(model),
            url: None,
            filename: None,
            subfolder: None,
        }
    }

    /// True when the slot lives in a subgraph definition rather than the
    /// top-level node list.
    pub fn targets_definition(&self) -> bool {
        match (&self.subgraph_id, self.is_top_level) {
            (Some(_), Some(false)) | (Some(_), None) => true,
            _ => false,
        }
    }

    /// Value to store in the widget slot. Local files are written relative
    /// to the root they were scanned from, which is how the host expects
    /// them; remote files as `subfolder/filename`.
    pub fn slot_value(&self) -> Option<String> {
        if let Some(model) = &self.resolved_model {
            let full = self
                .resolved_path
                .as_deref()
                .map(Path::new)
                .unwrap_or(model.path.as_path());
            return match full.strip_prefix(&model.base_directory) {
                Ok(relative) if !relative.as_os_str().is_empty() => Some(relative.to_string_lossy().into_owned()),
                _ if !model.relative_path.is_empty() => Some(model.relative_path.clone()),
                _ => Some(full.to_string_lossy().into_owned()),
            };
        }

        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            let filename = self
                .filename
                .clone()
                .filter(|f| !f.is_empty())
                .or_else(|| filename_from_url(url))?;
            return Some(match self.subfolder.as_deref().map(|s| s.trim_matches('/')) {
                Some(sub) if !sub.is_empty() => format!("{}/{}", sub, filename),
                _ => filename,
            });
        }

        self.resolved_path.clone().filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn model() -> LocalModel {
        LocalModel {
            filename: "a.safetensors".into(),
            path: PathBuf::from("/m/loras/style/a.safetensors"),
            relative_path: "style/a.safetensors".into(),
            category: "loras".into(),
            base_directory: PathBuf::from("/m/loras"),
        }
    }

    #[test]
    fn local_model_is_written_relative_to_its_root() {
        let resolution = Resolution::local(NodeId::Int(1), 0, model());
        assert_eq!(
            resolution.slot_value().map(PathBuf::from),
            Some(PathBuf::from("style").join("a.safetensors"))
        );
    }

    #[test]
    fn remote_resolution_uses_subfolder_and_url_name() {
        let resolution: Resolution = serde_json::from_value(json!({
            "node_id": 3,
            "widget_index": 1,
            "url": "https://huggingface.co/o/r/resolve/main/my%20vae.safetensors",
            "category": "vae",
            "subfolder": "flux/"
        }))
        .unwrap();
        assert_eq!(resolution.slot_value().as_deref(), Some("flux/my vae.safetensors"));
    }

    #[test]
    fn raw_path_is_kept_when_nothing_else_is_known() {
        let resolution: Resolution = serde_json::from_value(json!({
            "node_id": "7", "widget_index": 0, "resolved_path": "/abs/x.ckpt"
        }))
        .unwrap();
        assert_eq!(resolution.slot_value().as_deref(), Some("/abs/x.ckpt"));
        assert!(!resolution.targets_definition());
    }

    #[test]
    fn definition_targeting() {
        let mut resolution = Resolution::local(NodeId::Int(1), 0, model());
        resolution.subgraph_id = Some("sg".into());
        assert!(resolution.targets_definition());
        resolution.is_top_level = Some(true);
        assert!(!resolution.targets_definition());
    }
}
