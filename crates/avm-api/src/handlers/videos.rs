//! Video job handlers.

use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderValue};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{info, warn};

use avm_models::{ErrorCategory, Job, JobId, JobRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Create
// ============================================================================

#[derive(Serialize)]
pub struct CreateVideoResponse {
    pub video_id: String,
    pub status: String,
}

/// Submit a new narrated video job.
pub async fn create_video(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> ApiResult<Json<CreateVideoResponse>> {
    let job = state.jobs.submit(request).await?;
    info!(video_id = %job.id, mode = %job.mode, "Video job created");

    Ok(Json(CreateVideoResponse {
        video_id: job.id.to_string(),
        status: "processing".to_string(),
    }))
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub video_id: String,
    pub status: String,
    pub progress: u8,
    pub stage: String,
    pub stage_label: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for StatusResponse {
    fn from(job: Job) -> Self {
        Self {
            video_id: job.id.to_string(),
            status: job.status.as_str().to_string(),
            progress: job.progress,
            stage: job.stage.as_str().to_string(),
            stage_label: job.stage_label,
            mode: job.mode.as_str().to_string(),
            output_reference: job.output_reference,
            error_category: job.error_category,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let job = state.jobs.status(&JobId::from_string(video_id)).await?;
    Ok(Json(job.into()))
}

/// All jobs, newest first.
pub async fn list_videos(State(state): State<AppState>) -> Json<Vec<StatusResponse>> {
    let jobs = state.jobs.list().await;
    Json(jobs.into_iter().map(StatusResponse::from).collect())
}

// ============================================================================
// Stream / download
// ============================================================================

/// Play the deliverable inline.
pub async fn stream_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    request: Request<Body>,
) -> ApiResult<Response> {
    let id = JobId::from_string(video_id);
    let path = state.jobs.deliverable(&id).await?;
    serve_video(&path, request, HeaderValue::from_static("inline")).await
}

/// Download the deliverable as an attachment.
pub async fn download_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    request: Request<Body>,
) -> ApiResult<Response> {
    let id = JobId::from_string(video_id);
    let path = state.jobs.deliverable(&id).await?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"narrated_video_{}.mp4\"", id))
        .map_err(|e| ApiError::internal(format!("Invalid content disposition: {}", e)))?;
    serve_video(&path, request, disposition).await
}

/// Stream the file from disk. `ServeFile` answers `Range` requests with 206
/// or 416 and never buffers the whole file.
async fn serve_video(path: &FsPath, request: Request<Body>, disposition: HeaderValue) -> ApiResult<Response> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(ApiError::not_found("Video file not found")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Deliverable missing on disk");
            return Err(ApiError::not_found("Video file not found"));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to read video: {}", e))),
    }

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let mut response = response.map(Body::new);
    if response.status().is_success() {
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(response)
}
