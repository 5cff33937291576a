//! Full text, extracted images and raw parser result files.

use crate::error::ReaderError;
use crate::model::FullText;
use crate::pipeline::archive::resolve_within;
use crate::server::error::{ok, ApiError, ApiResult};
use crate::server::state::AppState;
use crate::workflow::{job_dir, read_full_text};
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::path::Path as FsPath;

/// `GET /api/full-text/{id}`
pub async fn full_text(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<FullText> {
    match read_full_text(&state.config.mineru_dir, &job_id).await {
        Ok((content, path)) => ok(
            "Full text loaded",
            FullText {
                content,
                path: Some(path.display().to_string()),
            },
        ),
        Err(ReaderError::FileNotFound { .. }) => Err(ApiError::not_found("full.md not found")),
        Err(e) => Err(e.into()),
    }
}

/// `GET /api/images/{id}/{*name}`
pub async fn image(
    State(state): State<AppState>,
    Path((job_id, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let images = job_dir(&state.config.mineru_dir, &job_id)?.join("images");
    let path = resolve_within(&images, &name).ok_or_else(|| ApiError::forbidden("Illegal path"))?;
    if !path.is_file() {
        return Err(ApiError::not_found(format!("Image not found: {name}")));
    }
    send_file(&path).await
}

/// `GET /api/mineru/{*path}`
pub async fn mineru_file(State(state): State<AppState>, Path(rel): Path<String>) -> Result<Response, ApiError> {
    let path = resolve_within(&state.config.mineru_dir, &rel).ok_or_else(|| ApiError::forbidden("Illegal path"))?;
    if path.is_dir() {
        return Err(ApiError::bad_request("Path is a directory"));
    }
    if !path.is_file() {
        return Err(ApiError::not_found(format!("File not found: {rel}")));
    }
    send_file(&path).await
}

async fn send_file(path: &FsPath) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ApiError::internal(format!("Cannot read '{}': {e}", path.display())))?;
    Ok(([(header::CONTENT_TYPE, content_type(path))], bytes).into_response())
}

/// MIME type of the file kinds a result archive contains.
pub fn content_type(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "md" => "text/markdown; charset=utf-8",
        "json" => "application/json",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
