//! Field mapping application
//!
//! Turns a raw CRM lead into the local check-in record using the active
//! [`FieldMapping`] rows, and builds the payloads sent back to the CRM.

use crate::crm::coerce::{coerce_id, coerce_scalar, display_name};
use crate::crm::CrmRecord;
use chrono::{DateTime, Utc};
use mxc_common::db::FieldMapping;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MODEL_NAME: &str = "model_name";
pub const MODEL_PHOTO: &str = "model_photo";
pub const RESPONSIBLE: &str = "responsible";
pub const PRESENCA_CONFIRMADA: &str = "presenca_confirmada";
pub const CHECKED_IN_AT: &str = "checked_in_at";
pub const DEAL_ID: &str = "deal_id";

/// Local fields an operator may map
pub const LOCAL_FIELDS: &[&str] = &[
    MODEL_NAME,
    MODEL_PHOTO,
    RESPONSIBLE,
    PRESENCA_CONFIRMADA,
    CHECKED_IN_AT,
    DEAL_ID,
];

/// Deal fields owned by the CRM; never copied into a cloned deal
const DEAL_SYSTEM_FIELDS: &[&str] = &["ID", "DATE_CREATE", "DATE_MODIFY", "CREATED_BY_ID", "MODIFY_BY_ID"];

/// Lead data after mappings and defaults were applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedLead {
    pub lead_id: u64,
    pub model_name: String,
    pub model_photo: Option<String>,
    pub responsible: Option<String>,
    pub deal_id: Option<u64>,
}

/// CRM field of the active mapping for `local_field`
pub fn active_crm_field<'a>(mappings: &'a [FieldMapping], local_field: &str) -> Option<&'a str> {
    mappings
        .iter()
        .find(|m| m.is_active && m.local_field == local_field)
        .map(|m| m.crm_field.as_str())
}

fn mapped_value<'a>(record: &'a CrmRecord, mappings: &[FieldMapping], local_field: &str) -> Option<&'a Value> {
    active_crm_field(mappings, local_field).and_then(|field| record.get(field))
}

pub fn map_lead(lead_id: u64, record: &CrmRecord, mappings: &[FieldMapping]) -> MappedLead {
    let scalar = |local_field: &str| mapped_value(record, mappings, local_field).and_then(coerce_scalar);

    let model_name = scalar(MODEL_NAME)
        .or_else(|| display_name(record))
        .unwrap_or_else(|| format!("Lead #{}", lead_id));

    let responsible = scalar(RESPONSIBLE).or_else(|| record.get("ASSIGNED_BY_ID").and_then(coerce_scalar));

    MappedLead {
        lead_id,
        model_name,
        model_photo: scalar(MODEL_PHOTO),
        responsible,
        deal_id: mapped_value(record, mappings, DEAL_ID).and_then(coerce_id),
    }
}

/// Fields for the single `crm.lead.update` sent after a local save.
///
/// Empty when none of the write-back fields is mapped.
pub fn writeback_fields(
    mappings: &[FieldMapping],
    checked_in_at: &DateTime<Utc>,
    model_photo: Option<&str>,
) -> CrmRecord {
    let mut fields = CrmRecord::new();

    if let Some(field) = active_crm_field(mappings, CHECKED_IN_AT) {
        fields.insert(field.to_string(), Value::String(checked_in_at.to_rfc3339()));
    }
    if let Some(field) = active_crm_field(mappings, PRESENCA_CONFIRMADA) {
        fields.insert(field.to_string(), Value::String("Y".to_string()));
    }
    if let (Some(field), Some(photo)) = (active_crm_field(mappings, MODEL_PHOTO), model_photo) {
        fields.insert(field.to_string(), Value::String(photo.to_string()));
    }

    fields
}

/// Fields for the deal registering an additional model under the same lead.
///
/// With a source deal, its fields are copied minus the CRM-owned ones and
/// the title gets the model name appended. Without one, a minimal deal is
/// built from the lead.
pub fn cloned_deal_fields(source: Option<&CrmRecord>, lead_id: u64, model_name: &str) -> CrmRecord {
    let mut fields = match source {
        Some(deal) => deal
            .iter()
            .filter(|(key, _)| !DEAL_SYSTEM_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        None => CrmRecord::new(),
    };

    let title = match source.and_then(|deal| deal.get("TITLE")).and_then(coerce_scalar) {
        Some(title) => format!("{} - {}", title, model_name),
        None => model_name.to_string(),
    };

    fields.insert("TITLE".to_string(), Value::String(title));
    fields.insert("LEAD_ID".to_string(), Value::from(lead_id));
    fields
}
