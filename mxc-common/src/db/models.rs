//! Database models
//!
//! UUIDs and timestamps are stored as TEXT; timestamps always use the fixed
//! microsecond RFC 3339 form from [`format_timestamp`] so that lexical
//! ordering in SQL matches chronological ordering.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad stored timestamp {:?}: {}", raw, e)))
}

pub fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Bad stored UUID {:?}: {}", raw, e)))
}

fn opt_uuid(raw: Option<String>) -> Result<Option<Uuid>> {
    raw.as_deref().map(parse_uuid).transpose()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Operator role. Admins may edit mappings, stages and panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            other => Err(Error::InvalidInput(format!("Unknown role {:?}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let permissions: String = row.try_get("permissions")?;
        Ok(Self {
            id: parse_uuid(row.try_get("id")?)?,
            email: row.try_get("email")?,
            role: Role::parse(row.try_get("role")?)?,
            permissions: serde_json::from_str(&permissions)?,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
        })
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.role == Role::Admin || self.permissions.iter().any(|p| p == permission)
    }
}

/// Local logical field → CRM field name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMapping {
    pub id: Uuid,
    pub local_field: String,
    pub crm_field: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FieldMapping {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(row.try_get("id")?)?,
            local_field: row.try_get("local_field")?,
            crm_field: row.try_get("crm_field")?,
            is_active: row.try_get::<i64, _>("is_active")? != 0,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
            updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckIn {
    pub id: i64,
    pub lead_id: i64,
    pub model_name: String,
    pub model_photo: Option<String>,
    pub responsible: Option<String>,
    pub deal_id: Option<i64>,
    pub checked_in_at: DateTime<Utc>,
}

impl CheckIn {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            lead_id: row.try_get("lead_id")?,
            model_name: row.try_get("model_name")?,
            model_photo: row.try_get("model_photo")?,
            responsible: row.try_get("responsible")?,
            deal_id: row.try_get("deal_id")?,
            checked_in_at: parse_timestamp(row.try_get("checked_in_at")?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KanbanStage {
    pub id: Uuid,
    pub name: String,
    pub position: i64,
    /// Outbound webhook fired when a card enters this stage
    pub webhook_url: Option<String>,
    /// Panel that receives a call when a card enters this stage
    pub calls_panel_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl KanbanStage {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(row.try_get("id")?)?,
            name: row.try_get("name")?,
            position: row.try_get("position")?,
            webhook_url: row.try_get("webhook_url")?,
            calls_panel_id: opt_uuid(row.try_get("calls_panel_id")?)?,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KanbanCard {
    pub id: Uuid,
    pub stage_id: Uuid,
    pub lead_id: i64,
    pub checkin_id: Option<i64>,
    pub title: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KanbanCard {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(row.try_get("id")?)?,
            stage_id: parse_uuid(row.try_get("stage_id")?)?,
            lead_id: row.try_get("lead_id")?,
            checkin_id: row.try_get("checkin_id")?,
            title: row.try_get("title")?,
            position: row.try_get("position")?,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
            updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        })
    }
}

/// Audit record of one card move
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KanbanEvent {
    pub id: i64,
    pub card_id: Uuid,
    pub from_stage_id: Option<Uuid>,
    pub to_stage_id: Uuid,
    pub moved_by: Option<String>,
    /// `sent`, `failed: <reason>`, or NULL when the stage has no webhook
    pub webhook_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl KanbanEvent {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            card_id: parse_uuid(row.try_get("card_id")?)?,
            from_stage_id: opt_uuid(row.try_get("from_stage_id")?)?,
            to_stage_id: parse_uuid(row.try_get("to_stage_id")?)?,
            moved_by: row.try_get("moved_by")?,
            webhook_status: row.try_get("webhook_status")?,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Panel {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Panel {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(row.try_get("id")?)?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            is_active: row.try_get::<i64, _>("is_active")? != 0,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
        })
    }
}

/// One positioned element on a panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutElement {
    /// What the element shows, e.g. `model_name`, `model_photo`, `clock`
    pub key: String,
    pub x: f64,
    pub y: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PanelLayout {
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub elements: Vec<LayoutElement>,
}

/// "Now calling" row shown on a panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Call {
    pub id: i64,
    pub panel_id: Uuid,
    pub card_id: Option<Uuid>,
    pub lead_id: i64,
    pub model_name: String,
    pub called_at: DateTime<Utc>,
}

impl Call {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            panel_id: parse_uuid(row.try_get("panel_id")?)?,
            card_id: opt_uuid(row.try_get("card_id")?)?,
            lead_id: row.try_get("lead_id")?,
            model_name: row.try_get("model_name")?,
            called_at: parse_timestamp(row.try_get("called_at")?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub lead_id: i64,
    pub client_name: Option<String>,
    pub phone: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub raw_payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let raw: String = row.try_get("raw_payload")?;
        Ok(Self {
            lead_id: row.try_get("lead_id")?,
            client_name: row.try_get("client_name")?,
            phone: row.try_get("phone")?,
            scheduled_at: parse_timestamp(row.try_get("scheduled_at")?)?,
            raw_payload: serde_json::from_str(&raw)?,
            updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        })
    }
}
