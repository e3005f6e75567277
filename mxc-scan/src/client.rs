//! Check-in service client

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{Result, ScanError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const USER_HEADER: &str = "x-user-id";

/// What the service made of one scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReply {
    /// `suppressed`, `candidates` or `flow`
    pub outcome: String,
    /// Flow state name when the outcome is `flow`
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    outcome: String,
    #[serde(default)]
    data: Value,
}

impl From<RawReply> for ScanReply {
    fn from(raw: RawReply) -> Self {
        let state = raw
            .data
            .get("state")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            outcome: raw.outcome,
            state,
        }
    }
}

pub struct CheckinClient {
    http_client: reqwest::Client,
    scan_url: String,
    user_id: Uuid,
}

impl CheckinClient {
    pub fn new(server: &str, user_id: Uuid) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http_client,
            scan_url: format!("{}/api/checkin/scan", server.trim_end_matches('/')),
            user_id,
        })
    }

    pub fn scan_url(&self) -> &str {
        &self.scan_url
    }

    /// POST one code to `/api/checkin/scan`
    pub async fn post_scan(&self, code: &str) -> Result<ScanReply> {
        let response = self
            .http_client
            .post(&self.scan_url)
            .header(USER_HEADER, self.user_id.to_string())
            .json(&json!({ "code": code }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("no error message")
                .to_string();
            return Err(ScanError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let raw: RawReply = response.json().await?;
        Ok(raw.into())
    }
}
