//! Kiosk check-in endpoints

use super::auth::CurrentUser;
use crate::checkin::{ConfirmChoice, FlowState};
use crate::db::checkins;
use crate::services::checkin::{self as flow, ScanOutcome};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use mxc_common::db::CheckIn;
use mxc_common::sse::create_event_sse_stream;
use serde::Deserialize;
use std::convert::Infallible;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub choice: ConfirmChoice,
}

#[derive(Debug, Deserialize)]
pub struct CheckinListQuery {
    pub lead_id: Option<i64>,
    pub limit: Option<i64>,
}

/// POST /api/checkin/scan
///
/// Scanner and QR triggers. Repeats of the same code inside the cooldown
/// window come back as `suppressed` without touching the flow.
pub async fn scan(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(req): Json<ScanRequest>,
) -> ApiResult<Json<ScanOutcome>> {
    Ok(Json(flow::scan(&state, &req.code).await?))
}

/// POST /api/checkin/search
///
/// Manual entry: lead ID, lead URL, or a phone number.
pub async fn search(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<ScanOutcome>> {
    Ok(Json(flow::search(&state, &req.query).await?))
}

/// POST /api/checkin/confirm
pub async fn confirm(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<Json<FlowState>> {
    tracing::info!(user = %user.email, choice = ?req.choice, "Confirming check-in");
    Ok(Json(flow::confirm(&state, req.choice).await?))
}

/// POST /api/checkin/dismiss
pub async fn dismiss(State(state): State<AppState>, _user: CurrentUser) -> Json<FlowState> {
    Json(flow::dismiss(&state).await)
}

/// GET /api/checkin/state
pub async fn get_state(State(state): State<AppState>, _user: CurrentUser) -> Json<FlowState> {
    Json(flow::current_state(&state).await)
}

/// GET /api/checkins?lead_id=&limit=
pub async fn list_checkins(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<CheckinListQuery>,
) -> ApiResult<Json<Vec<CheckIn>>> {
    let rows = match query.lead_id {
        Some(lead_id) if lead_id <= 0 => {
            return Err(ApiError::BadRequest("lead_id must be positive".to_string()))
        }
        Some(lead_id) => checkins::list_for_lead(&state.db, lead_id).await?,
        None => {
            let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
            checkins::list_recent(&state.db, limit).await?
        }
    };
    Ok(Json(rows))
}

/// GET /api/events
///
/// Every event on the bus, for the kiosk and back-office screens.
pub async fn event_stream(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    create_event_sse_stream(&state.events, user.email, |_| true)
}

pub fn checkin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/checkin/scan", post(scan))
        .route("/api/checkin/search", post(search))
        .route("/api/checkin/confirm", post(confirm))
        .route("/api/checkin/dismiss", post(dismiss))
        .route("/api/checkin/state", get(get_state))
        .route("/api/checkins", get(list_checkins))
        .route("/api/events", get(event_stream))
}
