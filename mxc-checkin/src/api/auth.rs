//! Caller identification and role checks
//!
//! Sign-in happens in front of this service (the kiosk shell or the
//! back-office proxy), which forwards the user's ID in `x-user-id`. The
//! middleware resolves it to a [`User`]; handlers then demand a signed-in
//! caller with [`CurrentUser`] or an admin with [`AdminUser`].

use crate::db::users;
use crate::{ApiError, AppState};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use mxc_common::db::{Role, User};
use mxc_common::retry::{retry_with, RetryPolicy};
use mxc_common::Error;
use sqlx::SqlitePool;
use uuid::Uuid;

pub const USER_HEADER: &str = "x-user-id";

/// Permission required to create and move Kanban cards
pub const PERM_KANBAN: &str = "kanban";

/// Look up the caller, retrying transient database failures
pub async fn fetch_user_role(db: &SqlitePool, id: Uuid) -> mxc_common::Result<User> {
    retry_with(
        "role fetch",
        RetryPolicy::ROLE_FETCH,
        |e: &Error| matches!(e, Error::Database(_)),
        || users::get_user(db, id),
    )
    .await
}

/// Resolve `x-user-id` into a [`CurrentUser`] request extension.
///
/// Requests without the header pass through anonymously; a malformed or
/// unknown ID is rejected.
pub async fn identify_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(raw) = request.headers().get(USER_HEADER) else {
        return Ok(next.run(request).await);
    };

    let id = raw
        .to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("Malformed {} header", USER_HEADER)))?;

    let user = fetch_user_role(&state.db, id).await.map_err(|e| match e {
        Error::NotFound(_) => ApiError::Unauthorized("Unknown user".to_string()),
        other => ApiError::Internal(format!("Role lookup failed: {}", other)),
    })?;

    tracing::debug!(user = %user.email, role = user.role.as_str(), "Identified caller");
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Any signed-in user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn require(&self, permission: &str) -> Result<(), ApiError> {
        if self.0.has_permission(permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("Missing permission '{}'", permission)))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Sign-in required".to_string()))
    }
}

/// A signed-in user with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden("Admin role required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
