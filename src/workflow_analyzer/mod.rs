// model-linker/src/workflow_analyzer/mod.rs

pub mod extractor;
pub mod missing_models;
pub mod node_kinds;
pub mod subgraphs;
pub mod types;
pub mod url_harvester;

pub use extractor::{analyze_workflow_models, get_node_model_info, is_model_filename};
pub use missing_models::identify_missing_models;
pub use node_kinds::{category_hint_for, NodeKind};
pub use types::{
    AnalysisResult,
    MissingEntry,
    ModelReference,
    NodeId,
    UrlSource,
    WorkflowUrl,
};
pub use url_harvester::extract_workflow_urls;
