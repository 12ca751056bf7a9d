// src/handlers/convert.rs
use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Json,
    routing::post,
    Router,
};
use std::sync::Arc;

use super::json_body;
use crate::error::ApiError;
use crate::models::api::{AnalyzeRequest, AnalyzeResponse, ConvertRequest, ConvertResponse};
use crate::scenes::{detect_scenes, DEFAULT_SCENE_THRESHOLD};
use crate::state::AppState;
use crate::storage::is_valid_storage_key;
use crate::transform::process_video_output;
use crate::utils::{get_file_extension, unique_storage_key};

pub fn convert_routes() -> Router {
    Router::new()
        .route("/analyze", post(analyze_video))
        .route("/convert", post(convert_video))
}

fn checked_key(filename: Option<String>) -> Result<String, ApiError> {
    let filename = filename
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::bad_request("Filename required"))?;
    if !is_valid_storage_key(&filename) {
        return Err(ApiError::bad_request("Invalid filename"));
    }
    Ok(filename)
}

pub async fn analyze_video(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let request = json_body(payload)?;
    let key = checked_key(request.filename)?;
    let threshold = request.threshold.unwrap_or(DEFAULT_SCENE_THRESHOLD);

    let extension = get_file_extension(&key).unwrap_or_else(|| "mp4".to_string());
    let input = state.workspace.temp_path("analyze", &extension)?;
    state.storage.download(&key, &input).await?;

    let path = input.to_path_buf();
    let report = tokio::task::spawn_blocking(move || detect_scenes(&path, threshold)).await??;

    let preview_url = state.storage.presigned_url(&key, state.signed_url_ttl).await?;
    tracing::info!(key = %key, scenes = report.scenes.len(), duration = report.duration, "Analysis complete");

    Ok(Json(AnalyzeResponse {
        status: "success",
        scenes: report.scenes,
        duration: report.duration,
        preview_url,
    }))
}

pub async fn convert_video(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let job = json_body(payload)?.into_job()?;
    let key = checked_key(Some(job.filename))?;

    let extension = get_file_extension(&key).unwrap_or_else(|| "mp4".to_string());
    let input = state.workspace.temp_path("source", &extension)?;
    let output = state.workspace.temp_path("render", job.format.extension())?;
    state.storage.download(&key, &input).await?;

    let input_path = input.to_path_buf();
    let output_path = output.to_path_buf();
    let options = job.options;
    tokio::task::spawn_blocking(move || process_video_output(&input_path, &output_path, &options)).await??;

    let output_key = unique_storage_key(&key, job.format.extension());
    state.storage.upload(&output, &output_key, job.format.content_type()).await?;
    let url = state.storage.presigned_url(&output_key, state.signed_url_ttl).await?;

    tracing::info!(source = %key, output = %output_key, format = ?job.format, "Conversion complete");

    Ok(Json(ConvertResponse {
        status: "success",
        filename: output_key,
        url,
    }))
}
