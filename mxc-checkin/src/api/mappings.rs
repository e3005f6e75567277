//! Field mapping endpoints

use super::auth::{AdminUser, CurrentUser};
use crate::checkin::mapping::LOCAL_FIELDS;
use crate::db::mappings;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use mxc_common::db::FieldMapping;
use mxc_common::events::MxcEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct MappingList {
    pub mappings: Vec<FieldMapping>,
    /// Local fields the check-in flow reads or writes
    pub local_fields: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMappingRequest {
    pub local_field: String,
    pub crm_field: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

fn announce(state: &AppState, mapping: &FieldMapping) {
    state.events.emit_lossy(MxcEvent::MappingChanged {
        local_field: mapping.local_field.clone(),
        timestamp: Utc::now(),
    });
}

/// GET /api/mappings
pub async fn list_mappings(State(state): State<AppState>, _user: CurrentUser) -> ApiResult<Json<MappingList>> {
    Ok(Json(MappingList {
        mappings: mappings::list_mappings(&state.db).await?,
        local_fields: LOCAL_FIELDS.to_vec(),
    }))
}

/// POST /api/mappings
pub async fn create_mapping(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CreateMappingRequest>,
) -> ApiResult<(StatusCode, Json<FieldMapping>)> {
    if !LOCAL_FIELDS.contains(&req.local_field.trim()) {
        return Err(ApiError::BadRequest(format!(
            "Unknown local field {:?}; expected one of {}",
            req.local_field.trim(),
            LOCAL_FIELDS.join(", ")
        )));
    }
    let mapping = mappings::create_mapping(&state.db, &req.local_field, &req.crm_field, req.is_active).await?;
    announce(&state, &mapping);
    Ok((StatusCode::CREATED, Json(mapping)))
}

/// POST /api/mappings/:id/activate
pub async fn activate_mapping(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FieldMapping>> {
    let mapping = mappings::activate_mapping(&state.db, id).await?;
    announce(&state, &mapping);
    Ok(Json(mapping))
}

/// POST /api/mappings/:id/deactivate
pub async fn deactivate_mapping(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FieldMapping>> {
    let mapping = mappings::deactivate_mapping(&state.db, id).await?;
    announce(&state, &mapping);
    Ok(Json(mapping))
}

/// DELETE /api/mappings/:id
pub async fn delete_mapping(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mapping = mappings::get_mapping(&state.db, id).await?;
    mappings::delete_mapping(&state.db, id).await?;
    announce(&state, &mapping);
    Ok(StatusCode::NO_CONTENT)
}

pub fn mapping_routes() -> Router<AppState> {
    Router::new()
        .route("/api/mappings", get(list_mappings).post(create_mapping))
        .route("/api/mappings/:id", axum::routing::delete(delete_mapping))
        .route("/api/mappings/:id/activate", post(activate_mapping))
        .route("/api/mappings/:id/deactivate", post(deactivate_mapping))
}
