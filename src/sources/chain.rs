// model-linker/src/sources/chain.rs

use log::{debug, info, warn};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LinkerConfig;

use super::civitai::CivitaiProvider;
use super::huggingface::HuggingFaceProvider;
use super::model_list::ModelListCatalog;
use super::popular::PopularCatalog;
use super::types::{MatchMode, RemoteSource, SourceKind, SourceProvider};

/// Upper bound on ranked candidates listed per catalog.
pub const SEARCH_LIMIT: usize = 5;

/// Per-provider outcome of a `/search`.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub popular: Option<RemoteSource>,
    pub model_list: Option<RemoteSource>,
    pub huggingface: Option<RemoteSource>,
    pub civitai: Option<RemoteSource>,
    pub found: bool,
    /// Every catalog candidate for the query, best first within each catalog.
    pub alternatives: Vec<RemoteSource>,
}

/// Entry count reported by one provider after a reload.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ReloadedSource {
    pub source: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
}

impl SearchResults {
    fn record(&mut self, kind: SourceKind, hit: RemoteSource) {
        let slot = match kind {
            SourceKind::Popular => &mut self.popular,
            SourceKind::ModelList => &mut self.model_list,
            SourceKind::Huggingface => &mut self.huggingface,
            SourceKind::Civitai => &mut self.civitai,
            SourceKind::Workflow => return,
        };
        *slot = Some(hit);
        self.found = true;
    }
}

/// Providers in priority order; lookups stop at the first hit.
#[derive(Clone)]
pub struct SourceChain {
    providers: Vec<Arc<dyn SourceProvider>>,
}

impl SourceChain {
    pub fn new(providers: Vec<Arc<dyn SourceProvider>>) -> Self {
        Self { providers }
    }

    /// Curated list, community list, HuggingFace, CivitAI.
    pub fn from_config(config: &LinkerConfig) -> Result<Self, String> {
        let client = Client::builder()
            .user_agent("ModelLinker/1.0")
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("Failed to build reqwest client: {}", e))?;

        let providers: Vec<Arc<dyn SourceProvider>> = vec![
            Arc::new(PopularCatalog::load(&config.metadata_dir)),
            Arc::new(ModelListCatalog::load(&config.metadata_dir)),
            Arc::new(HuggingFaceProvider::new(
                client.clone(),
                &config.huggingface_api_base,
                config.huggingface_token.clone(),
            )),
            Arc::new(CivitaiProvider::new(
                client,
                &config.civitai_api_base,
                config.civitai_api_key.clone(),
            )),
        ];
        Ok(Self::new(providers))
    }

    async fn first_hit<F>(&self, filename: &str, mode_for: F) -> Option<(SourceKind, RemoteSource)>
    where
        F: Fn(SourceKind) -> MatchMode,
    {
        for provider in &self.providers {
            let kind = provider.kind();
            match provider.lookup(filename, mode_for(kind)).await {
                Ok(Some(hit)) => {
                    debug!("{} found via {:?}", filename, kind);
                    return Some((kind, hit));
                }
                Ok(None) => {}
                Err(e) => warn!("Source {:?} failed for {}: {}", kind, filename, e),
            }
        }
        None
    }

    /// Exact-name lookup across every provider.
    pub async fn find_exact(&self, filename: &str) -> Option<RemoteSource> {
        self.first_hit(filename, |_| MatchMode::Exact)
            .await
            .map(|(_, hit)| hit)
    }

    /// Interactive search: the community list may answer with a close name,
    /// the hosted providers only with the exact one.
    pub async fn search(&self, filename: &str) -> SearchResults {
        let mut results = SearchResults::default();
        let mode_for = |kind: SourceKind| match kind {
            SourceKind::ModelList => MatchMode::Fuzzy,
            _ => MatchMode::Exact,
        };
        if let Some((kind, hit)) = self.first_hit(filename, mode_for).await {
            results.record(kind, hit);
        }
        results.alternatives = self.search_many(filename, SEARCH_LIMIT).await;
        results
    }

    /// Ranked candidates from every provider that can list them, in chain order.
    pub async fn search_many(&self, query: &str, limit: usize) -> Vec<RemoteSource> {
        let mut all = Vec::new();
        for provider in &self.providers {
            match provider.search_many(query, limit).await {
                Ok(hits) => all.extend(hits),
                Err(e) => warn!("Source {:?} could not list {}: {}", provider.kind(), query, e),
            }
        }
        all
    }

    /// Re-reads local catalogs and forgets cached remote answers.
    pub fn reload(&self) -> Vec<ReloadedSource> {
        self.providers
            .iter()
            .map(|provider| {
                let entries = provider.reload();
                info!("Reloaded {:?} source ({:?} entries)", provider.kind(), entries);
                ReloadedSource { source: provider.kind(), entries }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::model_list::ModelListEntry;
    use crate::sources::types::MatchKind;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        kind: SourceKind,
        answer: Result<Option<RemoteSource>, String>,
        calls: AtomicUsize,
    }

    impl Counting {
        fn new(kind: SourceKind, answer: Result<Option<RemoteSource>, String>) -> Arc<Self> {
            Arc::new(Self { kind, answer, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl SourceProvider for Counting {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn lookup(&self, _filename: &str, _mode: MatchMode) -> Result<Option<RemoteSource>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    fn hit(kind: SourceKind) -> RemoteSource {
        RemoteSource::new(kind, "f.safetensors", "https://x/f", MatchKind::Exact)
    }

    #[tokio::test]
    async fn stops_at_first_hit_and_skips_failures() {
        let failing = Counting::new(SourceKind::Popular, Err("boom".into()));
        let empty = Counting::new(SourceKind::ModelList, Ok(None));
        let found = Counting::new(SourceKind::Huggingface, Ok(Some(hit(SourceKind::Huggingface))));
        let never = Counting::new(SourceKind::Civitai, Ok(Some(hit(SourceKind::Civitai))));
        let providers: Vec<Arc<dyn SourceProvider>> = vec![failing, empty, found, never.clone()];
        let chain = SourceChain::new(providers);

        let results = chain.search("f.safetensors").await;
        assert!(results.found);
        assert!(results.popular.is_none());
        assert_eq!(results.huggingface.unwrap().source, SourceKind::Huggingface);
        assert!(results.civitai.is_none());
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn search_allows_fuzzy_model_list_but_find_exact_does_not() {
        let list = ModelListCatalog::new(vec![ModelListEntry {
            name: "Canny".into(),
            model_type: "controlnet".into(),
            filename: "control_v11p_sd15_canny.pth".into(),
            url: "https://x/canny.pth".into(),
            save_path: Some("controlnet".into()),
            size: None,
        }]);
        let providers: Vec<Arc<dyn SourceProvider>> = vec![
            Arc::new(PopularCatalog::new(BTreeMap::new(), BTreeMap::new())),
            Arc::new(list),
        ];
        let chain = SourceChain::new(providers);

        let results = chain.search("control_v11p_sd15_canny_fp16.pth").await;
        assert!(results.found);
        assert_eq!(results.model_list.unwrap().match_type, MatchKind::Fuzzy);

        assert!(chain.find_exact("control_v11p_sd15_canny_fp16.pth").await.is_none());
    }

    #[tokio::test]
    async fn search_lists_alternatives_from_every_catalog() {
        let mut models = BTreeMap::new();
        models.insert(
            "flux1-dev.safetensors".to_string(),
            serde_json::from_value(serde_json::json!({"url": "https://x/flux1-dev", "directory": "unet"})).unwrap(),
        );
        models.insert(
            "flux1-dev-fp8.safetensors".to_string(),
            serde_json::from_value(serde_json::json!({"url": "https://x/flux1-dev-fp8", "directory": "unet"})).unwrap(),
        );
        let list = ModelListCatalog::new(vec![ModelListEntry {
            name: "Flux dev".into(),
            model_type: "unet".into(),
            filename: "flux1-dev-q8.gguf".into(),
            url: "https://x/flux1-dev-q8.gguf".into(),
            save_path: Some("unet".into()),
            size: None,
        }]);
        let remote = Counting::new(SourceKind::Huggingface, Ok(None));
        let providers: Vec<Arc<dyn SourceProvider>> = vec![
            Arc::new(PopularCatalog::new(models, BTreeMap::new())),
            Arc::new(list),
            remote,
        ];
        let chain = SourceChain::new(providers);

        let listed = chain.search_many("flux1-dev", 10).await;
        let names: Vec<&str> = listed.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(names[..2], ["flux1-dev-fp8.safetensors", "flux1-dev.safetensors"]);
        assert!(listed.iter().skip(2).all(|s| s.source == SourceKind::ModelList));

        let results = chain.search("flux1-dev.safetensors").await;
        assert!(results.found);
        assert_eq!(results.popular.unwrap().filename, "flux1-dev.safetensors");
        assert!(results.alternatives.len() >= 2);
    }

    #[test]
    fn reload_reports_each_provider() {
        let remote: Arc<dyn SourceProvider> = Counting::new(SourceKind::Civitai, Ok(None));
        let providers: Vec<Arc<dyn SourceProvider>> = vec![
            Arc::new(PopularCatalog::new(BTreeMap::new(), BTreeMap::new())),
            remote,
        ];
        let chain = SourceChain::new(providers);
        assert_eq!(
            chain.reload(),
            vec![
                ReloadedSource { source: SourceKind::Popular, entries: Some(0) },
                ReloadedSource { source: SourceKind::Civitai, entries: None },
            ]
        );
    }

    #[tokio::test]
    async fn nothing_found() {
        let empty: Arc<dyn SourceProvider> = Counting::new(SourceKind::Popular, Ok(None));
        let chain = SourceChain::new(vec![empty]);
        assert_eq!(chain.search("x").await, SearchResults::default());
    }
}
