//! Session workflow API handlers
//!
//! POST /api/upload-archive, POST /api/upload-excel,
//! POST /api/resolve-duplicates, POST /api/skip-duplicates,
//! GET /api/sessions/:session_id

use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::types::{
    ArchiveUploadResponse, ResolutionResponse, ResolveRequest, RosterUploadResponse, SessionResponse, SkipRequest,
};
use crate::{
    error::{ApiError, ApiResult},
    models::UploadedFile,
    AppState,
};

/// Stream one multipart file field into the uploads area
///
/// The partial file is deleted on any failure, including exceeding `limit`.
async fn save_upload(state: &AppState, mut field: Field<'_>, limit: u64) -> ApiResult<UploadedFile> {
    let original_name = field
        .file_name()
        .map(str::to_string)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Uploaded file has no filename".to_string()))?;

    let upload = UploadedFile::new(state.workflow.new_upload_path(), original_name);
    let mut file = tokio::fs::File::create(upload.path()).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Upload interrupted: {}", e)))?
    {
        written += chunk.len() as u64;
        if written > limit {
            return Err(ApiError::PayloadTooLarge(format!(
                "{} exceeds the {} MB upload limit",
                upload.original_name(),
                limit / (1024 * 1024)
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    tracing::debug!(file = %upload.original_name(), bytes = written, "Upload stored");
    Ok(upload)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Malformed multipart body: {}", e))
}

/// POST /api/upload-archive
///
/// Extract a document bundle and open a session over it.
pub async fn upload_archive(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<ArchiveUploadResponse>> {
    let limit = state.workflow.config().max_upload_bytes;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        if name.as_deref() == Some("archive") {
            upload = Some(save_upload(&state, field, limit).await?);
        }
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'archive'".to_string()))?;
    let original_name = upload.original_name().to_string();

    let ingest = match state.workflow.ingest_bundle(upload).await {
        Ok(ingest) => ingest,
        Err(e) => {
            tracing::warn!(file = %original_name, error = %e, "Bundle ingestion failed");
            state.record_error(format!("{}: {}", original_name, e)).await;
            return Err(e.into());
        }
    };

    Ok(Json(ArchiveUploadResponse {
        success: true,
        session_id: ingest.session_id,
        files: ingest.files,
        message: format!("{} extracted ({} files)", original_name, ingest.files),
    }))
}

/// POST /api/upload-excel
///
/// Match every sheet of a roster against the session's documents.
pub async fn upload_roster(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<RosterUploadResponse>> {
    let limit = state.workflow.config().max_upload_bytes;
    let mut session_id = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("session_id") => {
                let text = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                session_id = Some(
                    Uuid::parse_str(text.trim())
                        .map_err(|_| ApiError::BadRequest(format!("Invalid session_id: {}", text.trim())))?,
                );
            }
            Some("excel") => upload = Some(save_upload(&state, field, limit).await?),
            _ => {}
        }
    }

    let session_id = session_id.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'session_id'".to_string()))?;
    let upload = upload.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'excel'".to_string()))?;

    let outcome = state.workflow.ingest_roster(session_id, upload).await?;
    Ok(Json(RosterUploadResponse::from(outcome)))
}

/// POST /api/resolve-duplicates
pub async fn resolve_duplicates(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Json<ResolutionResponse>> {
    let outcome = state
        .workflow
        .resolve(request.session_id, &request.pending_id, &request.selections)
        .await?;
    Ok(Json(ResolutionResponse::from(outcome)))
}

/// POST /api/skip-duplicates
pub async fn skip_duplicates(
    State(state): State<AppState>,
    Json(request): Json<SkipRequest>,
) -> ApiResult<Json<ResolutionResponse>> {
    let outcome = state.workflow.abandon(request.session_id, &request.pending_id).await?;
    Ok(Json(ResolutionResponse::from(outcome)))
}

/// GET /api/sessions/:session_id
pub async fn get_session(State(state): State<AppState>, Path(session_id): Path<Uuid>) -> ApiResult<Json<SessionResponse>> {
    let summary = state.workflow.session_summary(session_id).await?;
    Ok(Json(SessionResponse::from(summary)))
}

/// Build session workflow routes
///
/// Upload size is enforced while streaming, so the default body limit is off.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/upload-archive", post(upload_archive))
        .route("/api/upload-excel", post(upload_roster))
        .layer(DefaultBodyLimit::disable())
        .route("/api/resolve-duplicates", post(resolve_duplicates))
        .route("/api/skip-duplicates", post(skip_duplicates))
        .route("/api/sessions/:session_id", get(get_session))
}
