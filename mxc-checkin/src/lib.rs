//! mxc-checkin library - kiosk check-in service
//!
//! HTTP API for the front-desk kiosk, the back office, the calling panels
//! and the CRM webhooks. All state lives in SQLite and Bitrix24; the check-in
//! flow and the screensaver engine are held in memory per process.

use axum::Router;
use chrono::{DateTime, Utc};
use mxc_common::events::EventBus;
use mxc_screensaver::{Mulberry32, Screensaver, ScreensaverConfig, TransitionPicker, UsageMetrics};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod checkin;
pub mod crm;
pub mod db;
pub mod error;
pub mod services;

pub use error::{ApiError, ApiResult};

use checkin::CheckinFlow;
use crm::{BitrixClient, CrmClient};
use services::WebhookSender;

/// Events buffered per SSE subscriber
const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// CRM used by the check-in flow
    pub crm: Arc<dyn CrmClient>,
    /// Concrete Bitrix24 client when running against the real CRM; lets the
    /// settings API swap the webhook URL at runtime
    pub bitrix: Option<Arc<BitrixClient>>,
    pub events: EventBus,
    pub flow: Arc<Mutex<CheckinFlow>>,
    pub screensaver: Arc<Mutex<Screensaver>>,
    /// Where screensaver usage metrics are persisted; `None` keeps them in
    /// memory only
    pub metrics_path: Option<PathBuf>,
    pub webhooks: WebhookSender,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, crm: Arc<dyn CrmClient>, scan_cooldown_ms: u64) -> Self {
        let screensaver = Screensaver::new(
            ScreensaverConfig::default(),
            TransitionPicker::new(Mulberry32::from_clock()),
            UsageMetrics::default(),
        );
        Self {
            db,
            crm,
            bitrix: None,
            events: EventBus::new(EVENT_BUS_CAPACITY),
            flow: Arc::new(Mutex::new(services::checkin::new_flow(scan_cooldown_ms))),
            screensaver: Arc::new(Mutex::new(screensaver)),
            metrics_path: None,
            webhooks: WebhookSender::new(),
            startup_time: Utc::now(),
        }
    }

    /// Use the real Bitrix24 client as the CRM
    pub fn with_bitrix(mut self, client: Arc<BitrixClient>) -> Self {
        self.crm = client.clone();
        self.bitrix = Some(client);
        self
    }

    pub fn with_screensaver(mut self, screensaver: Screensaver, metrics_path: Option<PathBuf>) -> Self {
        self.screensaver = Arc::new(Mutex::new(screensaver));
        self.metrics_path = metrics_path;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    Router::new()
        .merge(api::health_routes())
        .merge(api::checkin_routes())
        .merge(api::mapping_routes())
        .merge(api::kanban_routes())
        .merge(api::panel_routes())
        .merge(api::screensaver_routes())
        .merge(api::admin_routes())
        .merge(api::appointment_routes())
        .merge(api::photo_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::identify_user,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
