//! Bundle download endpoint

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// `attachment` disposition with an ASCII fallback and the UTF-8 name
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// GET /api/download/:download_id
///
/// Streams the bundle; unknown or swept ids answer 404.
pub async fn download_bundle(State(state): State<AppState>, Path(download_id): Path<Uuid>) -> ApiResult<Response> {
    let record = state.workflow.find_bundle(download_id).await?;

    let file = match tokio::fs::File::open(&record.path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("Download not found: {}", download_id)))
        }
        Err(e) => return Err(e.into()),
    };
    let length = file.metadata().await?.len();

    tracing::info!(download_id = %download_id, file = %record.filename, bytes = length, "Serving bundle");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&record.filename)),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

pub fn download_routes() -> Router<AppState> {
    Router::new().route("/api/download/:download_id", get(download_bundle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_encodes_non_ascii() {
        let value = content_disposition("游客名单-Sheet1.zip");
        assert_eq!(
            value,
            "attachment; filename=\"____-Sheet1.zip\"; filename*=UTF-8''%E6%B8%B8%E5%AE%A2%E5%90%8D%E5%8D%95-Sheet1.zip"
        );
        assert!(axum::http::HeaderValue::from_str(&value).is_ok());
    }
}
