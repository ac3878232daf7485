use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Extension, Json,
};
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::models::{
    CurrentUser, DeleteFileRequest, DownloadLinkResponse, DownloadQuery, FileRecord,
    ListFilesQuery, RenameFileRequest, SignedDownloadQuery,
};
use crate::services::FileService;
use crate::storage::signer;
use crate::usage::UsageSummary;
use crate::AppState;

/// Upload a file
/// POST /api/files/upload
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let mut uploaded: Option<FileRecord> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to process multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::BadRequest("No file name provided".to_string()))?;
        let content_type = field.content_type().map(|s| s.to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;

        let record = FileService::upload(
            &state.db,
            state.storage.as_ref(),
            &current_user.id,
            file_name,
            content_type,
            data,
        )
        .await?;
        uploaded = Some(record);
    }

    let record = uploaded.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "File uploaded successfully",
        "file": record,
    })))
}

/// List, search and sort the caller's files
/// GET /api/files?types=documents,media&search=notes&sort=name-asc&limit=10
pub async fn list_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<Vec<FileRecord>>> {
    let records = FileService::list(&state.db, &current_user.id, &query).await?;
    Ok(Json(records))
}

/// Delete a file
/// DELETE /api/files
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<DeleteFileRequest>,
) -> Result<Json<Value>> {
    if req.id.is_empty() || req.storage_key.is_empty() {
        return Err(AppError::BadRequest("Missing parameters".to_string()));
    }

    FileService::delete(&state.db, state.storage.as_ref(), &current_user.id, &req.id).await?;
    Ok(Json(json!({ "message": "File deleted successfully" })))
}

/// Issue a signed download URL
/// GET /api/files/download?storage_key=...
pub async fn download_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<DownloadLinkResponse>> {
    if query.storage_key.is_empty() {
        return Err(AppError::BadRequest("Missing storage_key".to_string()));
    }

    let link = FileService::download_link(
        &state.db,
        &state.config,
        &current_user.id,
        &query.storage_key,
    )
    .await?;
    Ok(Json(link))
}

/// Rename a file
/// PUT /api/files/rename
pub async fn rename_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<RenameFileRequest>,
) -> Result<Json<Value>> {
    if req.id.is_empty() || req.name.is_empty() {
        return Err(AppError::BadRequest("Missing id or name".to_string()));
    }

    FileService::rename(&state.db, &current_user.id, &req.id, &req.name).await?;
    Ok(Json(json!({ "success": true })))
}

/// Storage usage summary for the dashboard
/// GET /api/files/usage
pub async fn storage_usage(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<UsageSummary>> {
    let summary = FileService::usage(&state.db, &current_user.id).await?;
    Ok(Json(summary))
}

/// Redeem a signed download URL. Public route; the signature, not a bearer
/// token, is the credential.
/// GET /api/files/raw/*key?expires=...&signature=...
pub async fn raw_download(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedDownloadQuery>,
) -> Result<Response> {
    if !signer::verify(&state.config.jwt.secret, &key, query.expires, &query.signature) {
        return Err(AppError::Unauthorized(
            "Invalid or expired download link".to_string(),
        ));
    }

    let data = state.storage.get(&key).await?;

    // Storage keys are "{owner}/{millis}-{name}"; recover the display name
    let file_name = key
        .rsplit('/')
        .next()
        .and_then(|segment| segment.split_once('-').map(|(_, name)| name))
        .unwrap_or("download");

    let content_type = mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .to_string();

    let fallback_name = file_name.replace(['"', '\\'], "_");
    let encoded_name = urlencoding::encode(file_name);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                fallback_name, encoded_name
            ),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}
