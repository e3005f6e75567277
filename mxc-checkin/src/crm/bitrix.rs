//! Bitrix24 REST client
//!
//! Every method is `POST {webhook_base}/{method}.json` with a JSON body.
//! Responses carry either `result` or `error` + `error_description`.

use super::coerce::coerce_id;
use super::{CrmClient, CrmError, CrmRecord, FileDownload};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;

const USER_AGENT: &str = concat!("MaxCheckin/", env!("CARGO_PKG_VERSION"));

/// Fields requested for phone-search candidates
const CANDIDATE_SELECT: &[&str] = &["ID", "NAME", "LAST_NAME", "TITLE", "PHONE"];

pub struct BitrixClient {
    http_client: reqwest::Client,
    /// Inbound webhook base, e.g. `https://acme.bitrix24.com.br/rest/1/abc123`.
    /// Replaceable at runtime from the settings API.
    webhook_url: RwLock<Option<String>>,
}

impl BitrixClient {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, CrmError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CrmError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            webhook_url: RwLock::new(webhook_url.map(|u| u.trim_end_matches('/').to_string())),
        })
    }

    pub async fn webhook_url(&self) -> Option<String> {
        self.webhook_url.read().await.clone()
    }

    pub async fn set_webhook_url(&self, url: Option<String>) {
        let url = url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());
        tracing::info!(configured = url.is_some(), "Bitrix24 webhook URL updated");
        *self.webhook_url.write().await = url;
    }

    /// Invoke one REST method and return its `result`
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, CrmError> {
        let base = self.webhook_url().await.ok_or(CrmError::NotConfigured)?;
        let url = format!("{}/{}.json", base, method);

        tracing::debug!(method = %method, "Calling Bitrix24");

        let response = self
            .http_client
            .post(&url)
            .json(&params)
            .send()
            .await
            .map_err(|e| CrmError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CrmError::Network(e.to_string()))?;

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(CrmError::Api {
                    code: status.as_u16().to_string(),
                    description: text,
                })
            }
            Err(e) => return Err(CrmError::Parse(e.to_string())),
        };

        if let Some(error) = body.get("error") {
            let code = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let description = body
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            tracing::warn!(method = %method, code = %code, description = %description, "Bitrix24 returned an error");

            if code.eq_ignore_ascii_case("NOT_FOUND")
                || description.to_ascii_lowercase().contains("not found")
            {
                return Err(CrmError::NotFound(format!("{}: {}", method, description)));
            }
            return Err(CrmError::Api { code, description });
        }

        if !status.is_success() {
            return Err(CrmError::Api {
                code: status.as_u16().to_string(),
                description: text,
            });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| CrmError::Parse(format!("{}: response has no result", method)))
    }

    async fn call_record(&self, method: &str, params: Value) -> Result<CrmRecord, CrmError> {
        match self.call(method, params).await? {
            Value::Object(record) => Ok(record),
            other => Err(CrmError::Parse(format!(
                "{}: expected an object, got {}",
                method, other
            ))),
        }
    }
}

#[async_trait]
impl CrmClient for BitrixClient {
    async fn get_lead(&self, lead_id: u64) -> Result<CrmRecord, CrmError> {
        let lead = self
            .call_record("crm.lead.get", json!({ "id": lead_id }))
            .await
            .map_err(|e| match e {
                CrmError::NotFound(_) => CrmError::NotFound(format!("lead {}", lead_id)),
                other => other,
            })?;
        tracing::info!(lead_id, "Fetched lead from Bitrix24");
        Ok(lead)
    }

    async fn update_lead(&self, lead_id: u64, fields: CrmRecord) -> Result<(), CrmError> {
        let result = self
            .call("crm.lead.update", json!({ "id": lead_id, "fields": fields }))
            .await?;
        if result == Value::Bool(false) {
            return Err(CrmError::Api {
                code: "UPDATE_REJECTED".to_string(),
                description: format!("crm.lead.update returned false for lead {}", lead_id),
            });
        }
        Ok(())
    }

    async fn find_leads_by_phone(&self, phone: &str) -> Result<Vec<u64>, CrmError> {
        let result = self
            .call(
                "duplicate.findbycomm",
                json!({ "entity_type": "LEAD", "type": "PHONE", "values": [phone] }),
            )
            .await?;

        // Empty matches come back as `[]`, hits as `{"LEAD": [..]}`
        Ok(result
            .get("LEAD")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(coerce_id).collect())
            .unwrap_or_default())
    }

    async fn list_leads(&self, lead_ids: &[u64]) -> Result<Vec<CrmRecord>, CrmError> {
        let result = self
            .call(
                "crm.lead.list",
                json!({ "filter": { "ID": lead_ids }, "select": CANDIDATE_SELECT }),
            )
            .await?;

        match result {
            Value::Array(rows) => Ok(rows
                .into_iter()
                .filter_map(|row| match row {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect()),
            other => Err(CrmError::Parse(format!(
                "crm.lead.list: expected an array, got {}",
                other
            ))),
        }
    }

    async fn get_deal(&self, deal_id: u64) -> Result<CrmRecord, CrmError> {
        self.call_record("crm.deal.get", json!({ "id": deal_id }))
            .await
            .map_err(|e| match e {
                CrmError::NotFound(_) => CrmError::NotFound(format!("deal {}", deal_id)),
                other => other,
            })
    }

    async fn add_deal(&self, fields: CrmRecord) -> Result<u64, CrmError> {
        let result = self.call("crm.deal.add", json!({ "fields": fields })).await?;
        let deal_id = coerce_id(&result)
            .ok_or_else(|| CrmError::Parse(format!("crm.deal.add: unexpected result {}", result)))?;
        tracing::info!(deal_id, "Created deal in Bitrix24");
        Ok(deal_id)
    }

    async fn fetch_file(&self, file_id: &str) -> Result<FileDownload, CrmError> {
        let file = self.call_record("disk.file.get", json!({ "id": file_id })).await?;
        let download_url = file
            .get("DOWNLOAD_URL")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CrmError::Parse(format!("disk.file.get: file {} has no DOWNLOAD_URL", file_id)))?;

        let response = self
            .http_client
            .get(download_url)
            .send()
            .await
            .map_err(|e| CrmError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CrmError::NotFound(format!("file {}", file_id)));
        }
        if !status.is_success() {
            return Err(CrmError::Api {
                code: status.as_u16().to_string(),
                description: format!("download of file {} failed", file_id),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CrmError::Network(e.to_string()))?;

        tracing::debug!(file_id = %file_id, size = bytes.len(), "Downloaded CRM file");
        Ok(FileDownload { content_type, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_client_fails_fast() {
        let client = BitrixClient::new(None, Duration::from_secs(1)).unwrap();
        let err = client.get_lead(1).await.unwrap_err();
        assert!(matches!(err, CrmError::NotConfigured));
    }

    #[tokio::test]
    async fn test_webhook_url_normalized() {
        let client = BitrixClient::new(Some("https://x.bitrix24.com/rest/1/abc/".into()), Duration::from_secs(1)).unwrap();
        assert_eq!(client.webhook_url().await.as_deref(), Some("https://x.bitrix24.com/rest/1/abc"));

        client.set_webhook_url(Some("  ".into())).await;
        assert_eq!(client.webhook_url().await, None);
    }
}
