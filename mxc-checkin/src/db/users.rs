//! Back-office users

use chrono::Utc;
use mxc_common::db::{format_timestamp, Role, User};
use mxc_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

pub async fn get_user(db: &Pool<Sqlite>, id: Uuid) -> Result<User> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", id)))?;
    User::from_row(&row)
}

pub async fn list_users(db: &Pool<Sqlite>) -> Result<Vec<User>> {
    let rows = sqlx::query("SELECT * FROM users ORDER BY email")
        .fetch_all(db)
        .await?;
    rows.iter().map(User::from_row).collect()
}

pub async fn create_user(
    db: &Pool<Sqlite>,
    email: &str,
    role: Role,
    permissions: &[String],
) -> Result<User> {
    let email = email.trim();
    if !email.contains('@') {
        return Err(Error::InvalidInput(format!("Invalid email {:?}", email)));
    }

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, role, permissions, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(email)
        .bind(role.as_str())
        .bind(serde_json::to_string(permissions)?)
        .bind(format_timestamp(&Utc::now()))
        .execute(db)
        .await
        .map_err(Error::from)
        .map_err(|e| {
            if e.is_unique_violation() {
                Error::Conflict(format!("User {} already exists", email))
            } else {
                e
            }
        })?;

    tracing::info!(email = %email, role = role.as_str(), "Created user");
    get_user(db, id).await
}

pub async fn update_user_access(
    db: &Pool<Sqlite>,
    id: Uuid,
    role: Role,
    permissions: &[String],
) -> Result<User> {
    let result = sqlx::query("UPDATE users SET role = ?, permissions = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(serde_json::to_string(permissions)?)
        .bind(id.to_string())
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {}", id)));
    }
    get_user(db, id).await
}

/// Create the first admin.
///
/// The "no admin yet" check and the insert are one statement, so concurrent
/// bootstraps cannot both succeed. Returns `None` once any admin exists.
pub async fn create_first_admin(
    db: &Pool<Sqlite>,
    email: &str,
    permissions: &[String],
) -> Result<Option<User>> {
    let email = email.trim();
    if !email.contains('@') {
        return Err(Error::InvalidInput(format!("Invalid email {:?}", email)));
    }

    let id = Uuid::new_v4();
    let result = sqlx::query(
        "INSERT INTO users (id, email, role, permissions, created_at)
         SELECT ?, ?, 'admin', ?, ?
         WHERE NOT EXISTS (SELECT 1 FROM users WHERE role = 'admin')",
    )
    .bind(id.to_string())
    .bind(email)
    .bind(serde_json::to_string(permissions)?)
    .bind(format_timestamp(&Utc::now()))
    .execute(db)
    .await
    .map_err(Error::from)
    .map_err(|e| {
        if e.is_unique_violation() {
            Error::Conflict(format!("User {} already exists", email))
        } else {
            e
        }
    })?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_user(db, id).await.map(Some)
}
