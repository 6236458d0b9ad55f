// model-linker/src/workflow_analyzer/node_kinds.rs

/// Loader node types whose model category is known up front. Every other
/// node type is `Unknown` and gets no category hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    CheckpointLoaderSimple,
    CheckpointLoader,
    UnClipCheckpointLoader,
    VaeLoader,
    LoraLoader,
    LoraLoaderModelOnly,
    UnetLoader,
    ControlNetLoader,
    ControlNetLoaderAdvanced,
    ClipVisionLoader,
    UpscaleModelLoader,
    HypernetworkLoader,
    EmbeddingLoader,
    Unknown,
}

impl NodeKind {
    pub fn from_type(node_type: &str) -> Self {
        match node_type {
            "CheckpointLoaderSimple" => NodeKind::CheckpointLoaderSimple,
            "CheckpointLoader" => NodeKind::CheckpointLoader,
            "unCLIPCheckpointLoader" => NodeKind::UnClipCheckpointLoader,
            "VAELoader" => NodeKind::VaeLoader,
            "LoraLoader" => NodeKind::LoraLoader,
            "LoraLoaderModelOnly" => NodeKind::LoraLoaderModelOnly,
            "UNETLoader" => NodeKind::UnetLoader,
            "ControlNetLoader" => NodeKind::ControlNetLoader,
            "ControlNetLoaderAdvanced" => NodeKind::ControlNetLoaderAdvanced,
            "CLIPVisionLoader" => NodeKind::ClipVisionLoader,
            "UpscaleModelLoader" => NodeKind::UpscaleModelLoader,
            "HypernetworkLoader" => NodeKind::HypernetworkLoader,
            "EmbeddingLoader" => NodeKind::EmbeddingLoader,
            _ => NodeKind::Unknown,
        }
    }

    /// Registry category this loader reads from.
    pub fn category_hint(self) -> Option<&'static str> {
        match self {
            NodeKind::CheckpointLoaderSimple
            | NodeKind::CheckpointLoader
            | NodeKind::UnClipCheckpointLoader => Some("checkpoints"),
            NodeKind::VaeLoader => Some("vae"),
            NodeKind::LoraLoader | NodeKind::LoraLoaderModelOnly => Some("loras"),
            // UNETLoader reads the unet folder, which the host files under diffusion_models.
            NodeKind::UnetLoader => Some("diffusion_models"),
            NodeKind::ControlNetLoader | NodeKind::ControlNetLoaderAdvanced => Some("controlnet"),
            NodeKind::ClipVisionLoader => Some("clip_vision"),
            NodeKind::UpscaleModelLoader => Some("upscale_models"),
            NodeKind::HypernetworkLoader => Some("hypernetworks"),
            NodeKind::EmbeddingLoader => Some("embeddings"),
            NodeKind::Unknown => None,
        }
    }
}

/// Shorthand for `NodeKind::from_type(node_type).category_hint()`.
pub fn category_hint_for(node_type: &str) -> Option<&'static str> {
    NodeKind::from_type(node_type).category_hint()
}
