//! Outbound webhooks fired when a Kanban card enters a stage

use serde_json::Value;
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct WebhookSender {
    http_client: reqwest::Client,
}

impl WebhookSender {
    pub fn new() -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default webhook client");
                reqwest::Client::new()
            });
        Self { http_client }
    }

    /// POST `payload` as JSON. Any non-2xx status is a failure.
    pub async fn deliver(&self, url: &str, payload: &Value) -> Result<u16, String> {
        let response = self
            .http_client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Webhook delivered");
            Ok(status.as_u16())
        } else {
            Err(format!("HTTP {}", status.as_u16()))
        }
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}
