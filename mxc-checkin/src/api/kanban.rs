//! Kanban board endpoints

use super::auth::{AdminUser, CurrentUser, PERM_KANBAN};
use crate::db::kanban;
use crate::services::kanban as board;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use mxc_common::db::{Call, KanbanCard, KanbanEvent, KanbanStage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StageRequest {
    pub name: String,
    pub webhook_url: Option<String>,
    pub calls_panel_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub order: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CardListQuery {
    pub stage_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub stage_id: Uuid,
    pub lead_id: i64,
    pub title: String,
    pub checkin_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MoveCardRequest {
    pub to_stage_id: Uuid,
    /// Index in the target stage; end of the list when omitted
    pub position: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MoveCardResponse {
    pub card: KanbanCard,
    pub event: KanbanEvent,
    pub call: Option<Call>,
}

/// GET /api/kanban/stages
pub async fn list_stages(State(state): State<AppState>, _user: CurrentUser) -> ApiResult<Json<Vec<KanbanStage>>> {
    Ok(Json(kanban::list_stages(&state.db).await?))
}

/// POST /api/kanban/stages
pub async fn create_stage(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<StageRequest>,
) -> ApiResult<(StatusCode, Json<KanbanStage>)> {
    let stage = kanban::create_stage(&state.db, &req.name, req.webhook_url.as_deref(), req.calls_panel_id).await?;
    Ok((StatusCode::CREATED, Json(stage)))
}

/// PUT /api/kanban/stages/:id
pub async fn update_stage(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StageRequest>,
) -> ApiResult<Json<KanbanStage>> {
    let stage = kanban::update_stage(&state.db, id, &req.name, req.webhook_url.as_deref(), req.calls_panel_id).await?;
    Ok(Json(stage))
}

/// DELETE /api/kanban/stages/:id
pub async fn delete_stage(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    kanban::delete_stage(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/kanban/stages/reorder
pub async fn reorder_stages(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<Json<Vec<KanbanStage>>> {
    Ok(Json(kanban::reorder_stages(&state.db, &req.order).await?))
}

/// GET /api/kanban/cards?stage_id=
pub async fn list_cards(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<CardListQuery>,
) -> ApiResult<Json<Vec<KanbanCard>>> {
    Ok(Json(kanban::list_cards(&state.db, query.stage_id).await?))
}

/// POST /api/kanban/cards
pub async fn create_card(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateCardRequest>,
) -> ApiResult<(StatusCode, Json<KanbanCard>)> {
    user.require(PERM_KANBAN)?;
    if req.lead_id <= 0 {
        return Err(ApiError::BadRequest("lead_id must be positive".to_string()));
    }
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    let card = kanban::create_card(&state.db, req.stage_id, req.lead_id, req.checkin_id, req.title.trim()).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// POST /api/kanban/cards/:id/move
pub async fn move_card(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveCardRequest>,
) -> ApiResult<Json<MoveCardResponse>> {
    user.require(PERM_KANBAN)?;
    let moved = board::move_card(&state, id, req.to_stage_id, req.position, Some(&user.0.email)).await?;
    Ok(Json(MoveCardResponse {
        card: moved.card,
        event: moved.event,
        call: moved.call.map(|(call, _)| call),
    }))
}

/// GET /api/kanban/cards/:id/events
pub async fn card_events(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<KanbanEvent>>> {
    kanban::get_card(&state.db, id).await?;
    Ok(Json(kanban::list_events(&state.db, id).await?))
}

pub fn kanban_routes() -> Router<AppState> {
    Router::new()
        .route("/api/kanban/stages", get(list_stages).post(create_stage))
        .route("/api/kanban/stages/reorder", post(reorder_stages))
        .route("/api/kanban/stages/:id", put(update_stage).delete(delete_stage))
        .route("/api/kanban/cards", get(list_cards).post(create_card))
        .route("/api/kanban/cards/:id/move", post(move_card))
        .route("/api/kanban/cards/:id/events", get(card_events))
}
