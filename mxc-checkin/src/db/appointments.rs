//! Appointments pushed by the CRM

use chrono::{DateTime, Utc};
use mxc_common::db::{format_timestamp, Appointment};
use mxc_common::{Error, Result};
use sqlx::{Pool, Sqlite};

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub lead_id: i64,
    pub client_name: Option<String>,
    pub phone: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub raw_payload: serde_json::Value,
}

/// Insert or replace the appointment of `lead_id`
pub async fn upsert_appointment(db: &Pool<Sqlite>, new: &NewAppointment) -> Result<Appointment> {
    sqlx::query(
        "INSERT INTO appointments (lead_id, client_name, phone, scheduled_at, raw_payload, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(lead_id) DO UPDATE SET
            client_name = excluded.client_name,
            phone = excluded.phone,
            scheduled_at = excluded.scheduled_at,
            raw_payload = excluded.raw_payload,
            updated_at = excluded.updated_at",
    )
    .bind(new.lead_id)
    .bind(&new.client_name)
    .bind(&new.phone)
    .bind(format_timestamp(&new.scheduled_at))
    .bind(serde_json::to_string(&new.raw_payload)?)
    .bind(format_timestamp(&Utc::now()))
    .execute(db)
    .await?;

    get_appointment(db, new.lead_id).await
}

pub async fn get_appointment(db: &Pool<Sqlite>, lead_id: i64) -> Result<Appointment> {
    let row = sqlx::query("SELECT * FROM appointments WHERE lead_id = ?")
        .bind(lead_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Appointment for lead {}", lead_id)))?;
    Appointment::from_row(&row)
}

/// Appointments scheduled in `[from, to)`
pub async fn list_between(
    db: &Pool<Sqlite>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Appointment>> {
    let rows = sqlx::query(
        "SELECT * FROM appointments WHERE scheduled_at >= ? AND scheduled_at < ? ORDER BY scheduled_at",
    )
    .bind(format_timestamp(&from))
    .bind(format_timestamp(&to))
    .fetch_all(db)
    .await?;
    rows.iter().map(Appointment::from_row).collect()
}
