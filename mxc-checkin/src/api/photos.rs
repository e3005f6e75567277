//! Lead photo proxy
//!
//! CRM file fields point at portal URLs that need the webhook credentials.
//! `GET /api/lead-photo?file_id=` resolves the file through the CRM and
//! returns its bytes with a permissive CORS header so panels on other
//! origins can show them.

use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PhotoQuery {
    pub file_id: Option<String>,
}

/// GET /api/lead-photo?file_id=
pub async fn lead_photo(State(state): State<AppState>, Query(query): Query<PhotoQuery>) -> ApiResult<Response> {
    let file_id = query
        .file_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| ApiError::BadRequest("file_id must be a numeric CRM file ID".to_string()))?;

    let file = state.crm.fetch_file(&file_id).await?;
    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (header::CACHE_CONTROL, HeaderValue::from_static("private, max-age=300")),
        ],
        file.bytes,
    )
        .into_response())
}

pub fn photo_routes() -> Router<AppState> {
    Router::new().route("/api/lead-photo", get(lead_photo))
}
