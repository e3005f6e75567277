//! Check-in rows
//!
//! Several rows may exist per lead (re-check-ins and additional models).
//! The most recent one answers "has this lead already checked in".

use chrono::{DateTime, Utc};
use mxc_common::db::{format_timestamp, CheckIn};
use mxc_common::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Values for a new check-in row
#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub lead_id: i64,
    pub model_name: String,
    pub model_photo: Option<String>,
    pub responsible: Option<String>,
    pub deal_id: Option<i64>,
    pub checked_in_at: DateTime<Utc>,
}

pub async fn latest_for_lead(db: &Pool<Sqlite>, lead_id: i64) -> Result<Option<CheckIn>> {
    let row = sqlx::query(
        "SELECT * FROM check_ins WHERE lead_id = ? ORDER BY checked_in_at DESC, id DESC LIMIT 1",
    )
    .bind(lead_id)
    .fetch_optional(db)
    .await?;
    row.as_ref().map(CheckIn::from_row).transpose()
}

pub async fn list_for_lead(db: &Pool<Sqlite>, lead_id: i64) -> Result<Vec<CheckIn>> {
    let rows = sqlx::query("SELECT * FROM check_ins WHERE lead_id = ? ORDER BY checked_in_at DESC, id DESC")
        .bind(lead_id)
        .fetch_all(db)
        .await?;
    rows.iter().map(CheckIn::from_row).collect()
}

pub async fn list_recent(db: &Pool<Sqlite>, limit: i64) -> Result<Vec<CheckIn>> {
    let rows = sqlx::query("SELECT * FROM check_ins ORDER BY checked_in_at DESC, id DESC LIMIT ?")
        .bind(limit)
        .fetch_all(db)
        .await?;
    rows.iter().map(CheckIn::from_row).collect()
}

pub async fn get_checkin(db: &Pool<Sqlite>, id: i64) -> Result<CheckIn> {
    let row = sqlx::query("SELECT * FROM check_ins WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Check-in {}", id)))?;
    CheckIn::from_row(&row)
}

/// Insert the first check-in for a lead.
///
/// The existence check and the insert are one statement, so two concurrent
/// confirmations cannot both create a "first" row; the loser gets
/// [`Error::Conflict`].
pub async fn insert_first_checkin(db: &Pool<Sqlite>, new: &NewCheckIn) -> Result<CheckIn> {
    let result = sqlx::query(
        "INSERT INTO check_ins (lead_id, model_name, model_photo, responsible, deal_id, checked_in_at)
         SELECT ?, ?, ?, ?, ?, ?
         WHERE NOT EXISTS (SELECT 1 FROM check_ins WHERE lead_id = ?)",
    )
    .bind(new.lead_id)
    .bind(&new.model_name)
    .bind(&new.model_photo)
    .bind(&new.responsible)
    .bind(new.deal_id)
    .bind(format_timestamp(&new.checked_in_at))
    .bind(new.lead_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(format!(
            "Lead {} already has a check-in",
            new.lead_id
        )));
    }
    get_checkin(db, result.last_insert_rowid()).await
}

/// Insert a follow-up check-in (re-check-in or additional model)
pub async fn insert_checkin(db: &Pool<Sqlite>, new: &NewCheckIn) -> Result<CheckIn> {
    let result = sqlx::query(
        "INSERT INTO check_ins (lead_id, model_name, model_photo, responsible, deal_id, checked_in_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(new.lead_id)
    .bind(&new.model_name)
    .bind(&new.model_photo)
    .bind(&new.responsible)
    .bind(new.deal_id)
    .bind(format_timestamp(&new.checked_in_at))
    .execute(db)
    .await?;
    get_checkin(db, result.last_insert_rowid()).await
}
