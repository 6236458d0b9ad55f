// model-linker/src/server/handlers.rs

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::download_manager::{DownloadJob, DownloadRequest};
use crate::error::{ApiError, ApiResult};
use crate::inventory::path_utils::file_name_of;
use crate::inventory::{scan_all_directories, FolderRegistry, LocalModel};
use crate::linker::{analyze_and_find_matches, attach_download_sources};
use crate::resolution::{apply_resolution, Resolution};
use crate::sources::{ReloadedSource, SearchResults};
use crate::workflow_analyzer::AnalysisResult;

use super::AppState;

fn internal(context: &str, e: impl std::fmt::Display) -> ApiError {
    let message = format!("{}: {}", context, e);
    error!("{}", message);
    ApiError::Internal(message)
}

#[derive(Deserialize)]
pub struct AnalyzeBody {
    #[serde(default)]
    pub workflow: Option<Value>,
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeBody>, JsonRejection>,
) -> ApiResult<Json<AnalysisResult>> {
    let Json(body) = payload?;
    let workflow = body
        .workflow
        .ok_or_else(|| ApiError::BadRequest("Missing workflow in request".to_string()))?;

    let ctx = state.ctx.clone();
    let mut result = tokio::task::spawn_blocking(move || {
        let available = scan_all_directories(&ctx.registry);
        analyze_and_find_matches(&workflow, &ctx.registry, &available, ctx.match_options)
    })
    .await
    .map_err(|e| internal("Workflow analysis failed", e))?;

    let ctx = &state.ctx;
    attach_download_sources(&mut result, &ctx.sources, &ctx.http, &ctx.credentials).await;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct ResolveBody {
    #[serde(default)]
    pub workflow: Option<Value>,
    #[serde(default)]
    pub resolutions: Option<Vec<Resolution>>,
}

pub async fn resolve(payload: Result<Json<ResolveBody>, JsonRejection>) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let mut workflow = body
        .workflow
        .ok_or_else(|| ApiError::BadRequest("Missing workflow in request".to_string()))?;
    let resolutions = body
        .resolutions
        .ok_or_else(|| ApiError::BadRequest("Missing resolutions in request".to_string()))?;

    let summary = apply_resolution(&mut workflow, &resolutions);
    Ok(Json(json!({
        "workflow": workflow,
        "success": true,
        "applied": summary.applied,
        "skipped": summary.skipped,
    })))
}

pub async fn list_models(State(state): State<AppState>) -> ApiResult<Json<Vec<LocalModel>>> {
    let ctx = state.ctx.clone();
    let models = tokio::task::spawn_blocking(move || scan_all_directories(&ctx.registry))
        .await
        .map_err(|e| internal("Model scan failed", e))?;
    Ok(Json(models))
}

#[derive(Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchBody>, JsonRejection>,
) -> ApiResult<Json<SearchResults>> {
    let Json(body) = payload?;
    let filename = body
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing filename in request".to_string()))?;
    let filename = file_name_of(filename.trim()).to_string();

    let mut results = state.ctx.sources.search(&filename).await;
    if let Some(category) = body.category.filter(|c| !c.is_empty()) {
        let category = FolderRegistry::canonical_category(&category);
        let SearchResults { popular, model_list, huggingface, civitai, alternatives, .. } = &mut results;
        let firsts = [popular, model_list, huggingface, civitai].into_iter().flatten();
        for hit in firsts.chain(alternatives.iter_mut()) {
            if hit.directory.is_none() {
                hit.directory = Some(category.clone());
            }
        }
    }
    info!(
        "Search for {}: found={}, {} alternatives",
        filename,
        results.found,
        results.alternatives.len()
    );
    Ok(Json(results))
}

#[derive(Deserialize)]
pub struct DownloadBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subfolder: Option<String>,
    #[serde(default)]
    pub huggingface_token: Option<String>,
    #[serde(default)]
    pub civitai_api_key: Option<String>,
}

pub async fn start_download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let url = body
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing url in request".to_string()))?;
    let category = body
        .category
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing category in request".to_string()))?;

    let target_dir = state
        .ctx
        .registry
        .download_directory(&category)
        .ok_or_else(|| ApiError::NotFound(format!("No directory configured for category {}", category)))?;

    let started = state
        .ctx
        .downloads
        .start_download(DownloadRequest {
            url: url.trim().to_string(),
            filename: body.filename,
            category: category.clone(),
            target_dir,
            subfolder: body.subfolder,
            huggingface_token: body.huggingface_token,
            civitai_api_key: body.civitai_api_key,
        })
        .map_err(|e| {
            warn!("Rejected download of {}: {}", url, e);
            ApiError::BadRequest(e)
        })?;

    Ok(Json(json!({
        "success": true,
        "download_id": started.id,
        "filename": started.filename,
        "category": category,
    })))
}

pub async fn progress(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<DownloadJob>> {
    state
        .ctx
        .downloads
        .get_progress(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Download not found: {}", id)))
}

pub async fn all_progress(State(state): State<AppState>) -> Json<HashMap<String, DownloadJob>> {
    Json(state.ctx.downloads.all_progress())
}

pub async fn cancel_download(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let signalled = state.ctx.downloads.cancel(&id);
    Json(json!({ "success": true, "download_id": id, "signalled": signalled }))
}

pub async fn clear_finished(State(state): State<AppState>) -> Json<Value> {
    let removed = state.ctx.downloads.clear_finished();
    Json(json!({ "success": true, "removed": removed }))
}

pub async fn directories(State(state): State<AppState>) -> Json<BTreeMap<String, PathBuf>> {
    Json(state.ctx.registry.directories())
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub reloaded: Vec<ReloadedSource>,
}

pub async fn reload_sources(State(state): State<AppState>) -> ApiResult<Json<ReloadResponse>> {
    let ctx = state.ctx.clone();
    let reloaded = tokio::task::spawn_blocking(move || ctx.sources.reload())
        .await
        .map_err(|e| internal("Source reload failed", e))?;
    Ok(Json(ReloadResponse { success: true, reloaded }))
}
