// model-linker/src/sources/mod.rs

pub mod chain;
pub mod civitai;
pub mod huggingface;
pub mod model_list;
pub mod popular;
pub mod types;

pub use chain::{ReloadedSource, SearchResults, SourceChain, SEARCH_LIMIT};
pub use civitai::CivitaiProvider;
pub use huggingface::HuggingFaceProvider;
pub use model_list::ModelListCatalog;
pub use popular::PopularCatalog;
pub use types::{MatchKind, MatchMode, RemoteSource, SourceKind, SourceProvider};
