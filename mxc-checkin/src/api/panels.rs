//! Calling panel endpoints
//!
//! Panel displays are unauthenticated: they read their layout, the current
//! call, and subscribe to their own event stream by slug.

use super::auth::{AdminUser, CurrentUser};
use crate::db::panels;
use crate::{ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use futures::Stream;
use mxc_common::db::{Call, Panel, PanelLayout};
use mxc_common::events::MxcEvent;
use mxc_common::sse::create_event_sse_stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

#[derive(Debug, Deserialize)]
pub struct CreatePanelRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct PanelCurrent {
    pub panel: Panel,
    pub call: Option<Call>,
    pub recent: Vec<Call>,
}

const RECENT_CALLS: i64 = 5;

/// GET /api/panels
pub async fn list_panels(State(state): State<AppState>, _user: CurrentUser) -> ApiResult<Json<Vec<Panel>>> {
    Ok(Json(panels::list_panels(&state.db).await?))
}

/// POST /api/panels
pub async fn create_panel(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CreatePanelRequest>,
) -> ApiResult<(StatusCode, Json<Panel>)> {
    let panel = panels::create_panel(&state.db, &req.name, req.slug.trim()).await?;
    Ok((StatusCode::CREATED, Json(panel)))
}

/// GET /api/panels/:slug/layout
pub async fn get_layout(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<PanelLayout>> {
    let panel = panels::get_panel_by_slug(&state.db, &slug).await?;
    Ok(Json(panels::get_layout(&state.db, panel.id).await?))
}

/// PUT /api/panels/:slug/layout
pub async fn put_layout(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(slug): Path<String>,
    Json(layout): Json<PanelLayout>,
) -> ApiResult<Json<PanelLayout>> {
    let panel = panels::get_panel_by_slug(&state.db, &slug).await?;
    panels::save_layout(&state.db, panel.id, &layout).await?;

    state.events.emit_lossy(MxcEvent::PanelLayoutChanged {
        panel_id: panel.id,
        panel_slug: panel.slug.clone(),
        timestamp: Utc::now(),
    });
    tracing::info!(panel = %panel.slug, elements = layout.elements.len(), "Saved panel layout");
    Ok(Json(layout))
}

/// GET /api/panels/:slug/current
pub async fn current_call(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<PanelCurrent>> {
    let panel = panels::get_panel_by_slug(&state.db, &slug).await?;
    let call = panels::latest_call(&state.db, panel.id).await?;
    let recent = panels::recent_calls(&state.db, panel.id, RECENT_CALLS).await?;
    Ok(Json(PanelCurrent { panel, call, recent }))
}

/// GET /api/panels/:slug/events
pub async fn panel_events(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let panel = panels::get_panel_by_slug(&state.db, &slug).await?;
    let client = format!("panel:{}", panel.slug);
    Ok(create_event_sse_stream(&state.events, client, move |event| {
        event.panel_slug() == Some(panel.slug.as_str())
    }))
}

pub fn panel_routes() -> Router<AppState> {
    Router::new()
        .route("/api/panels", get(list_panels).post(create_panel))
        .route("/api/panels/:slug/layout", get(get_layout).put(put_layout))
        .route("/api/panels/:slug/current", get(current_call))
        .route("/api/panels/:slug/events", get(panel_events))
}
