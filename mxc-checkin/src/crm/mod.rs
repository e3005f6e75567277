//! CRM access
//!
//! The check-in flow talks to Bitrix24 through the [`CrmClient`] trait so it
//! can run against [`bitrix::BitrixClient`] in production and an in-memory
//! fake in tests.

pub mod bitrix;
pub mod coerce;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bitrix::BitrixClient;

/// A CRM entity (lead or deal) as returned by the REST API. Field names are
/// CRM-defined, so the record stays dynamic.
pub type CrmRecord = serde_json::Map<String, serde_json::Value>;

/// CRM client errors
#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Bitrix24 webhook URL is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("CRM API error {code}: {description}")]
    Api { code: String, description: String },

    #[error("Not found in CRM: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Lead candidate returned by a phone search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadCandidate {
    pub lead_id: u64,
    pub name: String,
    pub phone: Option<String>,
}

impl LeadCandidate {
    /// Build a candidate from a `crm.lead.list` row
    pub fn from_record(record: &CrmRecord) -> Option<Self> {
        let lead_id = record.get("ID").and_then(coerce::coerce_id)?;
        let name = coerce::display_name(record).unwrap_or_else(|| format!("Lead #{}", lead_id));
        let phone = record.get("PHONE").and_then(coerce::coerce_scalar);
        Some(Self { lead_id, name, phone })
    }
}

/// Downloaded file body with its upstream content type
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub content_type: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    /// `crm.lead.get`
    async fn get_lead(&self, lead_id: u64) -> Result<CrmRecord, CrmError>;

    /// `crm.lead.update`
    async fn update_lead(&self, lead_id: u64, fields: CrmRecord) -> Result<(), CrmError>;

    /// `duplicate.findbycomm` for a phone number; returns matching lead IDs
    async fn find_leads_by_phone(&self, phone: &str) -> Result<Vec<u64>, CrmError>;

    /// `crm.lead.list` restricted to `lead_ids`
    async fn list_leads(&self, lead_ids: &[u64]) -> Result<Vec<CrmRecord>, CrmError>;

    /// `crm.deal.get`
    async fn get_deal(&self, deal_id: u64) -> Result<CrmRecord, CrmError>;

    /// `crm.deal.add`; returns the new deal ID
    async fn add_deal(&self, fields: CrmRecord) -> Result<u64, CrmError>;

    /// `disk.file.get` followed by a download of the file body
    async fn fetch_file(&self, file_id: &str) -> Result<FileDownload, CrmError>;
}

/// Phone search: resolve lead IDs, then list them as candidates
pub async fn search_by_phone(
    crm: &dyn CrmClient,
    phone: &str,
) -> Result<Vec<LeadCandidate>, CrmError> {
    let ids = crm.find_leads_by_phone(phone).await?;
    if ids.is_empty() {
        tracing::debug!(phone = %phone, "No leads matched phone");
        return Ok(Vec::new());
    }

    let records = crm.list_leads(&ids).await?;
    let candidates: Vec<LeadCandidate> = records.iter().filter_map(LeadCandidate::from_record).collect();
    tracing::debug!(phone = %phone, matches = candidates.len(), "Phone search complete");
    Ok(candidates)
}
