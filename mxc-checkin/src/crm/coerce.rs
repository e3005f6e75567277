//! Scalar coercion of CRM field values
//!
//! Bitrix24 returns some fields as arrays (multi-fields such as `PHONE`),
//! some as `{ "VALUE": ... }` objects, and file fields as
//! `{ "id", "showUrl", "downloadUrl" }`. The check-in flow only ever needs a
//! single display string.

use super::CrmRecord;
use serde_json::Value;

/// Proxy path that serves a CRM file by ID
pub const LEAD_PHOTO_PROXY: &str = "/api/lead-photo";

/// Coerce a CRM value to one display string.
///
/// `null` and `""` give `None`; strings and numbers pass through; booleans
/// become `Y`/`N`; arrays yield their first coercible element; `VALUE`
/// objects yield that value; file objects yield their download URL, else
/// their show URL, else a proxy path built from their ID.
pub fn coerce_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "Y" } else { "N" }.to_string()),
        Value::Array(items) => items.iter().find_map(coerce_scalar),
        Value::Object(map) => {
            if let Some(inner) = map.get("VALUE") {
                return coerce_scalar(inner);
            }
            coerce_file(map)
        }
    }
}

fn coerce_file(map: &serde_json::Map<String, Value>) -> Option<String> {
    for key in ["downloadUrl", "showUrl"] {
        if let Some(url) = map.get(key).and_then(coerce_scalar) {
            return Some(url);
        }
    }
    map.get("id")
        .and_then(coerce_scalar)
        .map(|id| format!("{}?file_id={}", LEAD_PHOTO_PROXY, id))
}

/// Coerce a CRM value to a positive numeric ID
pub fn coerce_id(value: &Value) -> Option<u64> {
    coerce_scalar(value)
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|id| *id > 0)
}

/// `NAME LAST_NAME`, else `TITLE`
pub fn display_name(record: &CrmRecord) -> Option<String> {
    let part = |key: &str| record.get(key).and_then(coerce_scalar);
    let full: Vec<String> = [part("NAME"), part("LAST_NAME")].into_iter().flatten().collect();
    if !full.is_empty() {
        return Some(full.join(" "));
    }
    part("TITLE")
}
