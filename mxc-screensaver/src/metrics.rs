//! Cumulative screensaver usage counters
//!
//! Informational only: shown on the back-office screen, never used to drive
//! playback. Persisted as JSON next to the kiosk database.

use crate::error::Result;
use crate::transitions::Transition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageMetrics {
    pub total_cycles: u64,
    /// Slide changes per transition type
    pub transition_cycles: BTreeMap<String, u64>,
    /// Views per media id
    pub media_views: BTreeMap<String, u64>,
    /// Accumulated on-screen time per media id
    pub media_view_ms: BTreeMap<String, u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UsageMetrics {
    /// Load from `path`; a missing file yields empty metrics
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No screensaver metrics at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn record_cycle(&mut self, transition: Transition) {
        self.total_cycles += 1;
        *self
            .transition_cycles
            .entry(transition.as_str().to_string())
            .or_default() += 1;
        self.updated_at = Some(Utc::now());
    }

    pub fn record_view(&mut self, media_id: &str, duration: Duration) {
        *self.media_views.entry(media_id.to_string()).or_default() += 1;
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let total = self.media_view_ms.entry(media_id.to_string()).or_default();
        *total = total.saturating_add(ms);
        self.updated_at = Some(Utc::now());
    }
}
