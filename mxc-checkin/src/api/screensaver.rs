//! Screensaver endpoints
//!
//! The kiosk browser renders the slideshow; this service owns the clock,
//! the seeded transition picks, the FPS governor and the usage metrics.

use super::auth::AdminUser;
use crate::db::settings;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use mxc_common::events::MxcEvent;
use mxc_screensaver::{MediaItem, RenderTier, ScreensaverConfig, ScreensaverStep, TierChange, UsageMetrics};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest clock step accepted in one call
const MAX_ADVANCE_MS: u64 = 60_000;

#[derive(Debug, Serialize)]
pub struct ScreensaverState {
    pub config: ScreensaverConfig,
    pub current_media: Option<MediaItem>,
    pub current_tagline: Option<String>,
    pub tier: RenderTier,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub steps: Vec<ScreensaverStep>,
    pub tier: RenderTier,
}

#[derive(Debug, Deserialize)]
pub struct FpsRequest {
    pub fps: f64,
}

#[derive(Debug, Serialize)]
pub struct FpsResponse {
    pub tier: RenderTier,
    pub changed: Option<TierChange>,
}

#[derive(Debug, Deserialize)]
pub struct ViewRequest {
    pub media_id: String,
    pub duration_ms: u64,
}

/// Persist metrics outside the engine lock, on the blocking pool
async fn save_metrics(state: &AppState, metrics: UsageMetrics) {
    let Some(path) = state.metrics_path.clone() else {
        return;
    };
    let result = tokio::task::spawn_blocking(move || {
        let saved = metrics.save(&path);
        (path, saved)
    })
    .await;
    match result {
        Ok((_, Ok(()))) => {}
        Ok((path, Err(e))) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to save screensaver metrics");
        }
        Err(e) => tracing::warn!(error = %e, "Screensaver metrics save task failed"),
    }
}

/// GET /api/screensaver/state
pub async fn get_state(State(state): State<AppState>) -> Json<ScreensaverState> {
    let ss = state.screensaver.lock().await;
    Json(ScreensaverState {
        config: ss.config().clone(),
        current_media: ss.current_media().cloned(),
        current_tagline: ss.current_tagline().map(str::to_string),
        tier: ss.tier(),
    })
}

/// POST /api/screensaver/advance
pub async fn advance(
    State(state): State<AppState>,
    Json(req): Json<AdvanceRequest>,
) -> ApiResult<Json<AdvanceResponse>> {
    if req.elapsed_ms > MAX_ADVANCE_MS {
        return Err(ApiError::BadRequest(format!(
            "elapsed_ms must be at most {}",
            MAX_ADVANCE_MS
        )));
    }

    let (steps, tier, snapshot) = {
        let mut ss = state.screensaver.lock().await;
        let steps = ss.advance(Duration::from_millis(req.elapsed_ms));
        let slid = steps.iter().any(|s| matches!(s, ScreensaverStep::Slide { .. }));
        let snapshot = slid.then(|| ss.metrics().clone());
        (steps, ss.tier(), snapshot)
    };

    if let Some(metrics) = snapshot {
        save_metrics(&state, metrics).await;
    }
    Ok(Json(AdvanceResponse { steps, tier }))
}

/// POST /api/screensaver/fps
///
/// One sample per second from the renderer.
pub async fn record_fps(State(state): State<AppState>, Json(req): Json<FpsRequest>) -> ApiResult<Json<FpsResponse>> {
    if !req.fps.is_finite() || req.fps < 0.0 {
        return Err(ApiError::BadRequest("fps must be a non-negative number".to_string()));
    }

    let (tier, changed) = {
        let mut ss = state.screensaver.lock().await;
        let changed = ss.record_fps(req.fps);
        (ss.tier(), changed)
    };

    if let Some(change) = &changed {
        state.events.emit_lossy(MxcEvent::ScreensaverTierChanged {
            tier: change.to.as_str().to_string(),
            average_fps: change.average_fps,
            timestamp: Utc::now(),
        });
    }
    Ok(Json(FpsResponse { tier, changed }))
}

/// POST /api/screensaver/view
pub async fn record_view(State(state): State<AppState>, Json(req): Json<ViewRequest>) -> ApiResult<Json<UsageMetrics>> {
    if req.media_id.trim().is_empty() {
        return Err(ApiError::BadRequest("media_id is required".to_string()));
    }

    let snapshot = {
        let mut ss = state.screensaver.lock().await;
        ss.record_view(req.media_id.trim(), Duration::from_millis(req.duration_ms));
        ss.metrics().clone()
    };
    save_metrics(&state, snapshot.clone()).await;
    Ok(Json(snapshot))
}

/// GET /api/screensaver/metrics
pub async fn get_metrics(State(state): State<AppState>) -> Json<UsageMetrics> {
    Json(state.screensaver.lock().await.metrics().clone())
}

/// PUT /api/screensaver/config
pub async fn put_config(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(config): Json<ScreensaverConfig>,
) -> ApiResult<Json<ScreensaverConfig>> {
    settings::save_screensaver_config(&state.db, &config).await?;
    state.screensaver.lock().await.reconfigure(config.clone());
    tracing::info!(media = config.media.len(), taglines = config.taglines.len(), "Screensaver reconfigured");
    Ok(Json(config))
}

pub fn screensaver_routes() -> Router<AppState> {
    Router::new()
        .route("/api/screensaver/state", get(get_state))
        .route("/api/screensaver/advance", post(advance))
        .route("/api/screensaver/fps", post(record_fps))
        .route("/api/screensaver/view", post(record_view))
        .route("/api/screensaver/metrics", get(get_metrics))
        .route("/api/screensaver/config", axum::routing::put(put_config))
}
