//! Event types and the in-process event bus
//!
//! Events are broadcast via [`EventBus`] and serialized for SSE so the
//! panels and the kiosk UI update without polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// MaxCheckin event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MxcEvent {
    /// A check-in row was persisted
    CheckinCompleted {
        checkin_id: i64,
        lead_id: i64,
        model_name: String,
        /// Whether the CRM write-back failed after the local save
        crm_sync_failed: bool,
        timestamp: DateTime<Utc>,
    },

    /// A Kanban card changed stage or position
    CardMoved {
        card_id: Uuid,
        from_stage: Uuid,
        to_stage: Uuid,
        position: i64,
        timestamp: DateTime<Utc>,
    },

    /// A "now calling" row was inserted for a panel
    PanelCall {
        call_id: i64,
        panel_id: Uuid,
        panel_slug: String,
        lead_id: i64,
        model_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A panel layout was saved
    PanelLayoutChanged {
        panel_id: Uuid,
        panel_slug: String,
        timestamp: DateTime<Utc>,
    },

    /// Active field mapping changed for a local field
    MappingChanged {
        local_field: String,
        timestamp: DateTime<Utc>,
    },

    /// Screensaver switched rendering tier
    ScreensaverTierChanged {
        tier: String,
        average_fps: f64,
        timestamp: DateTime<Utc>,
    },
}

impl MxcEvent {
    /// SSE `event:` name
    pub fn event_type(&self) -> &'static str {
        match self {
            MxcEvent::CheckinCompleted { .. } => "CheckinCompleted",
            MxcEvent::CardMoved { .. } => "CardMoved",
            MxcEvent::PanelCall { .. } => "PanelCall",
            MxcEvent::PanelLayoutChanged { .. } => "PanelLayoutChanged",
            MxcEvent::MappingChanged { .. } => "MappingChanged",
            MxcEvent::ScreensaverTierChanged { .. } => "ScreensaverTierChanged",
        }
    }

    /// Slug of the panel this event targets, if any
    pub fn panel_slug(&self) -> Option<&str> {
        match self {
            MxcEvent::PanelCall { panel_slug, .. }
            | MxcEvent::PanelLayoutChanged { panel_slug, .. } => Some(panel_slug),
            _ => None,
        }
    }
}

/// Broadcast bus shared by HTTP handlers and background tasks
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MxcEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MxcEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: MxcEvent) -> Result<usize, broadcast::error::SendError<MxcEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: MxcEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            debug!("No subscribers for {} event", event_type);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let event = MxcEvent::MappingChanged {
            local_field: "model_name".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(bus.emit(event.clone()).unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        let event = MxcEvent::MappingChanged {
            local_field: "model_name".to_string(),
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.capacity(), 10);
    }

    #[test]
    fn test_serialized_with_type_tag() {
        let event = MxcEvent::ScreensaverTierChanged {
            tier: "low".to_string(),
            average_fps: 24.5,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ScreensaverTierChanged");
        assert_eq!(json["tier"], "low");
        assert_eq!(event.panel_slug(), None);
    }
}
