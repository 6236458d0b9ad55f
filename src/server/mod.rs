// model-linker/src/server/mod.rs

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use log::info;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::LinkerConfig;
use crate::download_manager::{Credentials, DownloadManager};
use crate::inventory::FolderRegistry;
use crate::linker::MatchOptions;
use crate::sources::SourceChain;

/// Long-lived services shared by every request.
pub struct LinkerContext {
    pub registry: FolderRegistry,
    pub sources: SourceChain,
    pub downloads: DownloadManager,
    pub http: Client,
    pub credentials: Credentials,
    pub match_options: MatchOptions,
}

impl LinkerContext {
    pub fn from_config(config: &LinkerConfig) -> Result<Self, String> {
        let credentials = Credentials {
            huggingface_token: config.huggingface_token.clone(),
            civitai_api_key: config.civitai_api_key.clone(),
        };
        let http = Client::builder()
            .user_agent("ModelLinker/1.0")
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("Failed to build reqwest client: {}", e))?;

        Ok(Self {
            registry: config.folder_registry(),
            sources: SourceChain::from_config(config)?,
            downloads: DownloadManager::new(credentials.clone())?,
            http,
            credentials,
            match_options: MatchOptions {
                similarity_threshold: config.similarity_threshold,
                max_matches_per_model: config.max_matches_per_model,
            },
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<LinkerContext>,
}

impl AppState {
    pub fn new(ctx: LinkerContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/resolve", post(handlers::resolve))
        .route("/models", get(handlers::list_models))
        .route("/search", post(handlers::search))
        .route("/download", post(handlers::start_download))
        .route("/progress", get(handlers::all_progress))
        .route("/progress/{id}", get(handlers::progress))
        .route("/cancel/{id}", post(handlers::cancel_download))
        .route("/clear", post(handlers::clear_finished))
        .route("/directories", get(handlers::directories))
        .route("/reload", post(handlers::reload_sources))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Serves until ctrl-c.
pub async fn serve(state: AppState, bind_addr: &str) -> Result<(), String> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", bind_addr, e))?;
    info!("Model linker listening on {}", bind_addr);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e))
}
