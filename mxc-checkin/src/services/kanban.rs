//! Card moves and their side effects
//!
//! The database writes happen in [`crate::db::kanban::move_card`]; this
//! layer publishes the resulting events and fires the stage webhook in the
//! background, recording the outcome on the audit row.

use crate::db::kanban::{self, CardMove};
use crate::AppState;
use chrono::Utc;
use mxc_common::db::{CheckIn, KanbanCard};
use mxc_common::events::MxcEvent;
use mxc_common::Result;
use serde_json::json;
use uuid::Uuid;

pub async fn move_card(
    state: &AppState,
    card_id: Uuid,
    to_stage_id: Uuid,
    position: Option<usize>,
    moved_by: Option<&str>,
) -> Result<CardMove> {
    let moved = kanban::move_card(&state.db, card_id, to_stage_id, position, moved_by).await?;
    let now = Utc::now();

    state.events.emit_lossy(MxcEvent::CardMoved {
        card_id,
        from_stage: moved.from_stage,
        to_stage: to_stage_id,
        position: moved.card.position,
        timestamp: now,
    });

    if let Some((call, panel)) = &moved.call {
        state.events.emit_lossy(MxcEvent::PanelCall {
            call_id: call.id,
            panel_id: panel.id,
            panel_slug: panel.slug.clone(),
            lead_id: call.lead_id,
            model_name: call.model_name.clone(),
            timestamp: now,
        });
    }

    if let Some(url) = moved.to_stage.webhook_url.clone() {
        let payload = json!({
            "event": "card_moved",
            "card_id": moved.card.id,
            "lead_id": moved.card.lead_id,
            "title": moved.card.title,
            "from_stage_id": moved.from_stage,
            "to_stage": { "id": moved.to_stage.id, "name": moved.to_stage.name },
            "moved_by": moved_by,
            "moved_at": now,
        });
        let db = state.db.clone();
        let sender = state.webhooks.clone();
        let event_id = moved.event.id;

        tokio::spawn(async move {
            let status = match sender.deliver(&url, &payload).await {
                Ok(_) => "sent".to_string(),
                Err(reason) => {
                    tracing::warn!(event_id, url = %url, reason = %reason, "Stage webhook failed");
                    format!("failed: {}", reason)
                }
            };
            if let Err(e) = kanban::set_webhook_status(&db, event_id, &status).await {
                tracing::error!(event_id, error = %e, "Failed to record webhook status");
            }
        });
    }

    Ok(moved)
}

/// Put a fresh check-in on the board's first stage.
///
/// Returns `None` when the board has no stages.
pub async fn add_checkin_card(state: &AppState, checkin: &CheckIn) -> Result<Option<KanbanCard>> {
    let Some(stage) = kanban::first_stage(&state.db).await? else {
        tracing::debug!(checkin_id = checkin.id, "No Kanban stages; skipping card");
        return Ok(None);
    };

    let card = kanban::create_card(
        &state.db,
        stage.id,
        checkin.lead_id,
        Some(checkin.id),
        &checkin.model_name,
    )
    .await?;

    tracing::info!(card_id = %card.id, stage = %stage.name, lead_id = checkin.lead_id, "Added check-in to board");
    Ok(Some(card))
}
