//! HTTP request handlers.

use std::path::Path as FsPath;

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::info;

use super::{ApiError, AppState, OwnerId};
use crate::error::ServiceError;
use crate::models::{ArchiveJob, ArchiveRecord, ArchiveRequest, ScheduledJob};
use crate::services::validate_submission;

/// Query params for listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: u32,
}

/// Accept a submission and acknowledge it immediately.
///
/// The outcome of a one-off run reaches the owner by email only.
pub async fn submit_archive(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Json(request): Json<ArchiveRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let validated =
        validate_submission(&request, &state.settings.crawler).map_err(ServiceError::from)?;

    if let Some(cadence) = validated.schedule {
        let job = state.schedules.create(&owner, validated, cadence).await?;
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "scheduled", "schedule": job })),
        ));
    }

    let url = validated.settings.display_url();
    let job = ArchiveJob::new(validated.settings, owner, validated.email);
    state.pipeline.spawn(job);
    info!("Accepted archive request for {}", url);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "started", "url": url })),
    ))
}

pub async fn list_archives(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<PageParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let archives: Vec<ArchiveRecord> = state.archives.list(&owner, params.page).await?;
    let total = state.archives.count(&owner).await?;
    Ok(Json(json!({
        "archives": archives,
        "page": params.page,
        "total": total,
    })))
}

pub async fn download_archive(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let (record, path) = state.archives.download(&owner, &id).await?;
    let mut response = serve_file(&path, request).await;

    let disposition = format!("attachment; filename=\"{}\"", record.file_name);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

pub async fn delete_archive(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state.archives.delete(&owner, &id).await?;
    Ok(Json(json!({ "deleted": record.file_name })))
}

pub async fn preview_index(
    State(state): State<AppState>,
    owner: OwnerId,
    Path(id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    preview(state, owner, id, String::new(), request).await
}

pub async fn preview_file(
    State(state): State<AppState>,
    owner: OwnerId,
    Path((id, path)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    preview(state, owner, id, path, request).await
}

async fn preview(
    state: AppState,
    OwnerId(owner): OwnerId,
    id: String,
    relative: String,
    request: Request,
) -> Result<Response, ApiError> {
    let path = state.archives.preview_file(&owner, &id, &relative).await?;
    Ok(serve_file(&path, request).await)
}

/// Serve one file from disk with content type and range handling.
async fn serve_file(path: &FsPath, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

pub async fn list_schedules(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<PageParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let schedules: Vec<ScheduledJob> = state.schedules.list(&owner, params.page).await?;
    Ok(Json(json!({ "schedules": schedules, "page": params.page })))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
) -> Result<Json<ScheduledJob>, ApiError> {
    Ok(Json(state.schedules.get(&owner, &id).await?))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
    Json(request): Json<ArchiveRequest>,
) -> Result<Json<ScheduledJob>, ApiError> {
    let validated =
        validate_submission(&request, &state.settings.crawler).map_err(ServiceError::from)?;
    Ok(Json(state.schedules.update(&owner, &id, validated).await?))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.schedules.delete(&owner, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn pause_schedule(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
) -> Result<Json<ScheduledJob>, ApiError> {
    Ok(Json(state.schedules.pause(&owner, &id).await?))
}

pub async fn resume_schedule(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<String>,
) -> Result<Json<ScheduledJob>, ApiError> {
    Ok(Json(state.schedules.resume(&owner, &id).await?))
}
