//! Back-office administration: CRM connection and users

use super::auth::AdminUser;
use crate::db::{settings, users};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use mxc_common::db::{Role, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct BitrixSettings {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// GET /api/settings/bitrix
pub async fn get_bitrix(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<BitrixSettings>> {
    let webhook_url = match &state.bitrix {
        Some(client) => client.webhook_url().await,
        None => settings::get_bitrix_webhook_url(&state.db).await?,
    };
    Ok(Json(BitrixSettings { webhook_url }))
}

/// PUT /api/settings/bitrix
///
/// Stored in the database, which takes precedence over environment and
/// TOML values on the next start; applied to the live client immediately.
pub async fn put_bitrix(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<BitrixSettings>,
) -> ApiResult<Json<BitrixSettings>> {
    let url = req.webhook_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    if let Some(url) = url {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ApiError::BadRequest("webhook_url must be an http(s) URL".to_string()));
        }
    }

    settings::set_bitrix_webhook_url(&state.db, url).await?;
    if let Some(client) = &state.bitrix {
        client.set_webhook_url(url.map(str::to_string)).await;
    }
    tracing::info!(admin = %admin.email, configured = url.is_some(), "Bitrix24 webhook URL changed");

    Ok(Json(BitrixSettings {
        webhook_url: url.map(str::to_string),
    }))
}

/// GET /api/users
pub async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(users::list_users(&state.db).await?))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = users::create_user(&state.db, &req.email, req.role, &req.permissions).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/users/bootstrap
///
/// Creates the first admin. Refused once any admin exists.
pub async fn bootstrap_admin(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = users::create_first_admin(&state.db, &req.email, &req.permissions)
        .await?
        .ok_or_else(|| ApiError::Forbidden("An admin already exists".to_string()))?;
    tracing::warn!(email = %user.email, "Bootstrapped first admin");
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    if id == admin.id && req.role != Role::Admin {
        return Err(ApiError::Conflict("Admins cannot demote themselves".to_string()));
    }
    Ok(Json(users::update_user_access(&state.db, id, req.role, &req.permissions).await?))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/settings/bitrix", get(get_bitrix).put(put_bitrix))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/bootstrap", post(bootstrap_admin))
        .route("/api/users/:id", put(update_user))
}
