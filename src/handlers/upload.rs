// src/handlers/upload.rs
//
// Intake routes: multipart upload and fetch-from-URL. Both scan the file and
// store it under a fresh key.

use axum::{
    extract::{multipart::Multipart, rejection::JsonRejection, DefaultBodyLimit, Extension},
    response::Json,
    routing::post,
    Router,
};
use reqwest::Url;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use super::json_body;
use crate::error::ApiError;
use crate::models::api::{ProcessUrlRequest, UploadResponse};
use crate::state::AppState;
use crate::storage::content_type_for_key;
use crate::utils::{get_file_extension, is_supported_video_format, unique_storage_key};
use crate::workspace::Workspace;

pub fn upload_routes(max_upload_bytes: u64) -> Router {
    Router::new()
        .route("/upload", post(upload_video))
        .route("/process-url", post(process_url))
        .layer(DefaultBodyLimit::max(usize::try_from(max_upload_bytes).unwrap_or(usize::MAX)))
}

pub async fn upload_video(
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut field = loop {
        match multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid upload: {}", e)))?
        {
            Some(field) if field.name() == Some("video") => break field,
            Some(_) => continue,
            None => return Err(ApiError::bad_request("No file uploaded")),
        }
    };

    let filename = field.file_name().map(str::trim).unwrap_or_default().to_string();
    if filename.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    if !is_supported_video_format(&filename) {
        tracing::warn!(filename = %filename, "Rejected upload with unsupported extension");
        return Err(ApiError::bad_request("Invalid file type. Use MP4, AVI, MOV, WEBM or MKV"));
    }
    let extension = get_file_extension(&filename).unwrap_or_default();

    let temp = state.workspace.temp_path("upload", &extension)?;
    let mut file = tokio::fs::File::create(&temp).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::bad_request(format!("Upload interrupted: {}", e)))?
    {
        written += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    if written == 0 {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    tracing::info!(filename = %filename, size_bytes = written, path = %temp.display(), "Saved upload to workspace");

    state.scan_policy.enforce(state.scanner.as_ref(), &temp).await?;

    let key = unique_storage_key(&filename, &extension);
    state.storage.upload(&temp, &key, content_type_for_key(&key)).await?;
    tracing::info!(filename = %filename, key = %key, "Upload stored");

    Ok(Json(UploadResponse {
        status: "success",
        filename: key,
    }))
}

pub async fn process_url(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ProcessUrlRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let request = json_body(payload)?;
    let url = request
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("URL required"))?;

    // everything the fetcher writes, partial or not, goes when this drops
    let fetch_dir = state.workspace.temp_dir("fetch")?;
    let stem = Workspace::unique_stem("remote");
    let fetched = state.fetcher.fetch(&url, fetch_dir.path(), &stem).await?;

    state.scan_policy.enforce(state.scanner.as_ref(), &fetched.path).await?;

    let original_name = format!("{}.{}", display_name(&url, fetched.title.as_deref()), fetched.extension);
    let key = unique_storage_key(&original_name, &fetched.extension);
    state.storage.upload(&fetched.path, &key, content_type_for_key(&key)).await?;
    tracing::info!(url = %url, key = %key, "Remote video stored");

    Ok(Json(UploadResponse {
        status: "success",
        filename: key,
    }))
}

/// Name used for the storage key: the video title, else the last URL segment.
fn display_name(url: &str, title: Option<&str>) -> String {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }

    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map(|segment| match segment.rsplit_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => segment,
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "video".to_string())
}
