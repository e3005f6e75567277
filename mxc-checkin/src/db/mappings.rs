//! Field mapping storage
//!
//! At most one mapping per local field is active. Activation runs in one
//! transaction that deactivates the siblings first; the partial unique index
//! `idx_field_mappings_one_active` rejects anything that slips past.

use chrono::Utc;
use mxc_common::db::{format_timestamp, FieldMapping};
use mxc_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

pub async fn list_mappings(db: &Pool<Sqlite>) -> Result<Vec<FieldMapping>> {
    let rows = sqlx::query("SELECT * FROM field_mappings ORDER BY local_field, created_at")
        .fetch_all(db)
        .await?;
    rows.iter().map(FieldMapping::from_row).collect()
}

pub async fn active_mappings(db: &Pool<Sqlite>) -> Result<Vec<FieldMapping>> {
    let rows = sqlx::query("SELECT * FROM field_mappings WHERE is_active = 1 ORDER BY local_field")
        .fetch_all(db)
        .await?;
    rows.iter().map(FieldMapping::from_row).collect()
}

pub async fn get_mapping(db: &Pool<Sqlite>, id: Uuid) -> Result<FieldMapping> {
    let row = sqlx::query("SELECT * FROM field_mappings WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Field mapping {}", id)))?;
    FieldMapping::from_row(&row)
}

/// Insert a mapping; when `activate` is set any other active mapping for the
/// same local field is deactivated in the same transaction.
pub async fn create_mapping(
    db: &Pool<Sqlite>,
    local_field: &str,
    crm_field: &str,
    activate: bool,
) -> Result<FieldMapping> {
    let local_field = local_field.trim();
    let crm_field = crm_field.trim();
    if local_field.is_empty() || crm_field.is_empty() {
        return Err(Error::InvalidInput(
            "local_field and crm_field are required".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    let now = format_timestamp(&Utc::now());

    let mut tx = db.begin().await?;
    if activate {
        sqlx::query("UPDATE field_mappings SET is_active = 0, updated_at = ? WHERE local_field = ? AND is_active = 1")
            .bind(&now)
            .bind(local_field)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query(
        "INSERT INTO field_mappings (id, local_field, crm_field, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(local_field)
    .bind(crm_field)
    .bind(activate as i64)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(Error::from)
    .map_err(conflict_on_unique)?;
    tx.commit().await?;

    tracing::info!(local_field = %local_field, crm_field = %crm_field, active = activate, "Created field mapping");
    get_mapping(db, id).await
}

/// Make `id` the active mapping for its local field
pub async fn activate_mapping(db: &Pool<Sqlite>, id: Uuid) -> Result<FieldMapping> {
    let mapping = get_mapping(db, id).await?;
    let now = format_timestamp(&Utc::now());

    let mut tx = db.begin().await?;
    sqlx::query(
        "UPDATE field_mappings SET is_active = 0, updated_at = ?
         WHERE local_field = ? AND id != ? AND is_active = 1",
    )
    .bind(&now)
    .bind(&mapping.local_field)
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;
    sqlx::query("UPDATE field_mappings SET is_active = 1, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(Error::from)
        .map_err(conflict_on_unique)?;
    tx.commit().await?;

    tracing::info!(local_field = %mapping.local_field, crm_field = %mapping.crm_field, "Activated field mapping");
    get_mapping(db, id).await
}

pub async fn deactivate_mapping(db: &Pool<Sqlite>, id: Uuid) -> Result<FieldMapping> {
    let result = sqlx::query("UPDATE field_mappings SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(format_timestamp(&Utc::now()))
        .bind(id.to_string())
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Field mapping {}", id)));
    }
    get_mapping(db, id).await
}

pub async fn delete_mapping(db: &Pool<Sqlite>, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM field_mappings WHERE id = ?")
        .bind(id.to_string())
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Field mapping {}", id)));
    }
    Ok(())
}

fn conflict_on_unique(err: Error) -> Error {
    if err.is_unique_violation() {
        Error::Conflict("Another mapping is already active for this field".to_string())
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        mxc_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_active_replaces_previous() {
        let pool = setup_test_db().await;
        let first = create_mapping(&pool, "model_name", "UF_CRM_A", true).await.unwrap();
        let second = create_mapping(&pool, "model_name", "UF_CRM_B", true).await.unwrap();

        let active = active_mappings(&pool).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
        assert!(!get_mapping(&pool, first.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_activate_switches_active_mapping() {
        let pool = setup_test_db().await;
        let a = create_mapping(&pool, "model_photo", "UF_CRM_A", true).await.unwrap();
        let b = create_mapping(&pool, "model_photo", "UF_CRM_B", false).await.unwrap();
        assert!(!b.is_active);

        activate_mapping(&pool, b.id).await.unwrap();
        let active = active_mappings(&pool).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].crm_field, "UF_CRM_B");

        // Re-activating the active one is a no-op
        activate_mapping(&pool, b.id).await.unwrap();
        assert_eq!(active_mappings(&pool).await.unwrap().len(), 1);
        assert!(!get_mapping(&pool, a.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_fields_are_independent() {
        let pool = setup_test_db().await;
        create_mapping(&pool, "model_name", "UF_CRM_A", true).await.unwrap();
        create_mapping(&pool, "model_photo", "UF_CRM_B", true).await.unwrap();
        assert_eq!(active_mappings(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_fields_rejected() {
        let pool = setup_test_db().await;
        let err = create_mapping(&pool, " ", "UF_CRM_A", true).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_mapping() {
        let pool = setup_test_db().await;
        assert!(matches!(activate_mapping(&pool, Uuid::new_v4()).await, Err(Error::NotFound(_))));
        assert!(matches!(delete_mapping(&pool, Uuid::new_v4()).await, Err(Error::NotFound(_))));
    }
}
