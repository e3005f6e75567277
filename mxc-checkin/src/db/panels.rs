//! Panels, their layouts and "now calling" rows

use chrono::Utc;
use mxc_common::db::{format_timestamp, Call, Panel, PanelLayout};
use mxc_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

const MAX_SLUG_LEN: usize = 64;

/// Slugs are lowercase ASCII letters, digits and inner hyphens
pub fn validate_slug(slug: &str) -> Result<()> {
    let valid = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && slug.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid panel slug {:?}", slug)))
    }
}

pub async fn list_panels(db: &Pool<Sqlite>) -> Result<Vec<Panel>> {
    let rows = sqlx::query("SELECT * FROM panels ORDER BY name")
        .fetch_all(db)
        .await?;
    rows.iter().map(Panel::from_row).collect()
}

pub async fn get_panel(db: &Pool<Sqlite>, id: Uuid) -> Result<Panel> {
    let row = sqlx::query("SELECT * FROM panels WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Panel {}", id)))?;
    Panel::from_row(&row)
}

pub async fn get_panel_by_slug(db: &Pool<Sqlite>, slug: &str) -> Result<Panel> {
    let row = sqlx::query("SELECT * FROM panels WHERE slug = ?")
        .bind(slug)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Panel '{}'", slug)))?;
    Panel::from_row(&row)
}

pub async fn create_panel(db: &Pool<Sqlite>, name: &str, slug: &str) -> Result<Panel> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Panel name is required".to_string()));
    }
    validate_slug(slug)?;

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO panels (id, name, slug, is_active, created_at) VALUES (?, ?, ?, 1, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(slug)
        .bind(format_timestamp(&Utc::now()))
        .execute(db)
        .await
        .map_err(Error::from)
        .map_err(|e| {
            if e.is_unique_violation() {
                Error::Conflict(format!("Panel slug '{}' is taken", slug))
            } else {
                e
            }
        })?;

    tracing::info!(panel = %name, slug = %slug, "Created panel");
    get_panel(db, id).await
}

pub async fn set_panel_active(db: &Pool<Sqlite>, id: Uuid, active: bool) -> Result<Panel> {
    let result = sqlx::query("UPDATE panels SET is_active = ? WHERE id = ?")
        .bind(active as i64)
        .bind(id.to_string())
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Panel {}", id)));
    }
    get_panel(db, id).await
}

/// Stored layout, or an empty one when the panel was never laid out
pub async fn get_layout(db: &Pool<Sqlite>, panel_id: Uuid) -> Result<PanelLayout> {
    let row: Option<(String,)> = sqlx::query_as("SELECT layout FROM panel_layouts WHERE panel_id = ?")
        .bind(panel_id.to_string())
        .fetch_optional(db)
        .await?;
    match row {
        Some((raw,)) => Ok(serde_json::from_str(&raw)?),
        None => Ok(PanelLayout::default()),
    }
}

pub async fn save_layout(db: &Pool<Sqlite>, panel_id: Uuid, layout: &PanelLayout) -> Result<()> {
    for element in &layout.elements {
        if element.key.trim().is_empty() {
            return Err(Error::InvalidInput("Layout element key is required".to_string()));
        }
        let sizes = [element.width, element.height, element.font_size];
        if sizes.iter().flatten().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::InvalidInput(format!(
                "Layout element '{}' has a negative or non-finite size",
                element.key
            )));
        }
    }

    sqlx::query(
        "INSERT INTO panel_layouts (panel_id, layout, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(panel_id) DO UPDATE SET layout = excluded.layout, updated_at = excluded.updated_at",
    )
    .bind(panel_id.to_string())
    .bind(serde_json::to_string(layout)?)
    .bind(format_timestamp(&Utc::now()))
    .execute(db)
    .await?;
    Ok(())
}

pub async fn get_call(db: &Pool<Sqlite>, id: i64) -> Result<Call> {
    let row = sqlx::query("SELECT * FROM calls WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Call {}", id)))?;
    Call::from_row(&row)
}

/// Newest call for a panel; this is what the panel displays
pub async fn latest_call(db: &Pool<Sqlite>, panel_id: Uuid) -> Result<Option<Call>> {
    let row = sqlx::query("SELECT * FROM calls WHERE panel_id = ? ORDER BY called_at DESC, id DESC LIMIT 1")
        .bind(panel_id.to_string())
        .fetch_optional(db)
        .await?;
    row.as_ref().map(Call::from_row).transpose()
}

pub async fn recent_calls(db: &Pool<Sqlite>, panel_id: Uuid, limit: i64) -> Result<Vec<Call>> {
    let rows = sqlx::query("SELECT * FROM calls WHERE panel_id = ? ORDER BY called_at DESC, id DESC LIMIT ?")
        .bind(panel_id.to_string())
        .bind(limit)
        .fetch_all(db)
        .await?;
    rows.iter().map(Call::from_row).collect()
}
