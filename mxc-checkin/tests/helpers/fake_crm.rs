//! In-memory CRM
//!
//! Stands in for Bitrix24 behind the `CrmClient` trait. Leads, deals and
//! phone matches are seeded by the test; writes are recorded for assertions.

use async_trait::async_trait;
use bytes::Bytes;
use mxc_checkin::crm::{CrmClient, CrmError, CrmRecord, FileDownload};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

pub struct FakeCrm {
    leads: Mutex<HashMap<u64, CrmRecord>>,
    deals: Mutex<HashMap<u64, CrmRecord>>,
    phones: Mutex<HashMap<String, Vec<u64>>>,
    files: Mutex<HashMap<String, FileDownload>>,
    pub lead_updates: Mutex<Vec<(u64, CrmRecord)>>,
    pub added_deals: Mutex<Vec<CrmRecord>>,
    pub lead_fetches: AtomicU64,
    fail_updates: AtomicBool,
    fail_lookups: AtomicBool,
    next_deal_id: AtomicU64,
}

impl Default for FakeCrm {
    fn default() -> Self {
        Self {
            leads: Mutex::new(HashMap::new()),
            deals: Mutex::new(HashMap::new()),
            phones: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
            lead_updates: Mutex::new(Vec::new()),
            added_deals: Mutex::new(Vec::new()),
            lead_fetches: AtomicU64::new(0),
            fail_updates: AtomicBool::new(false),
            fail_lookups: AtomicBool::new(false),
            next_deal_id: AtomicU64::new(9000),
        }
    }
}

fn record(value: Value) -> CrmRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

impl FakeCrm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lead(self, lead_id: u64, fields: Value) -> Self {
        let mut fields = record(fields);
        fields.insert("ID".to_string(), Value::String(lead_id.to_string()));
        self.leads.lock().unwrap().insert(lead_id, fields);
        self
    }

    pub fn with_deal(self, deal_id: u64, fields: Value) -> Self {
        let mut fields = record(fields);
        fields.insert("ID".to_string(), Value::String(deal_id.to_string()));
        self.deals.lock().unwrap().insert(deal_id, fields);
        self
    }

    pub fn with_phone(self, phone: &str, lead_ids: &[u64]) -> Self {
        self.phones
            .lock()
            .unwrap()
            .insert(phone.to_string(), lead_ids.to_vec());
        self
    }

    pub fn with_file(self, file_id: &str, content_type: &str, body: &'static [u8]) -> Self {
        self.files.lock().unwrap().insert(
            file_id.to_string(),
            FileDownload {
                content_type: content_type.to_string(),
                bytes: Bytes::from_static(body),
            },
        );
        self
    }

    /// Make `crm.lead.update` fail
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make every read fail as if the network were down
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn updates(&self) -> Vec<(u64, CrmRecord)> {
        self.lead_updates.lock().unwrap().clone()
    }

    pub fn new_deals(&self) -> Vec<CrmRecord> {
        self.added_deals.lock().unwrap().clone()
    }

    fn check_network(&self) -> Result<(), CrmError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            Err(CrmError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CrmClient for FakeCrm {
    async fn get_lead(&self, lead_id: u64) -> Result<CrmRecord, CrmError> {
        self.check_network()?;
        self.lead_fetches.fetch_add(1, Ordering::SeqCst);
        self.leads
            .lock()
            .unwrap()
            .get(&lead_id)
            .cloned()
            .ok_or_else(|| CrmError::NotFound(format!("lead {}", lead_id)))
    }

    async fn update_lead(&self, lead_id: u64, fields: CrmRecord) -> Result<(), CrmError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(CrmError::Api {
                code: "ACCESS_DENIED".to_string(),
                description: "write not allowed".to_string(),
            });
        }
        self.lead_updates.lock().unwrap().push((lead_id, fields));
        Ok(())
    }

    async fn find_leads_by_phone(&self, phone: &str) -> Result<Vec<u64>, CrmError> {
        self.check_network()?;
        Ok(self.phones.lock().unwrap().get(phone).cloned().unwrap_or_default())
    }

    async fn list_leads(&self, lead_ids: &[u64]) -> Result<Vec<CrmRecord>, CrmError> {
        self.check_network()?;
        let leads = self.leads.lock().unwrap();
        Ok(lead_ids.iter().filter_map(|id| leads.get(id).cloned()).collect())
    }

    async fn get_deal(&self, deal_id: u64) -> Result<CrmRecord, CrmError> {
        self.check_network()?;
        self.deals
            .lock()
            .unwrap()
            .get(&deal_id)
            .cloned()
            .ok_or_else(|| CrmError::NotFound(format!("deal {}", deal_id)))
    }

    async fn add_deal(&self, fields: CrmRecord) -> Result<u64, CrmError> {
        self.check_network()?;
        let id = self.next_deal_id.fetch_add(1, Ordering::SeqCst);
        self.added_deals.lock().unwrap().push(fields.clone());
        self.deals.lock().unwrap().insert(id, fields);
        Ok(id)
    }

    async fn fetch_file(&self, file_id: &str) -> Result<FileDownload, CrmError> {
        self.check_network()?;
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| CrmError::NotFound(format!("file {}", file_id)))
    }
}
