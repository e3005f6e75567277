//! Kanban stages, cards and the move audit trail
//!
//! Positions are dense (`0..n`) within the stage list and within each
//! stage's card list. Every mutation that shifts positions rewrites them in
//! the same transaction.

use chrono::Utc;
use mxc_common::db::{format_timestamp, Call, KanbanCard, KanbanEvent, KanbanStage, Panel};
use mxc_common::{Error, Result};
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::collections::HashSet;
use uuid::Uuid;

/// Everything a card move wrote
#[derive(Debug, Clone)]
pub struct CardMove {
    pub card: KanbanCard,
    pub from_stage: Uuid,
    pub to_stage: KanbanStage,
    pub event: KanbanEvent,
    /// Call row inserted when the card entered a stage bound to a panel
    pub call: Option<(Call, Panel)>,
}

/// Remove `item` from `order` and reinsert it at `index` (clamped)
pub fn splice_order(mut order: Vec<Uuid>, item: Uuid, index: usize) -> Vec<Uuid> {
    order.retain(|id| *id != item);
    let index = index.min(order.len());
    order.insert(index, item);
    order
}

// ============================================================================
// Stages
// ============================================================================

pub async fn list_stages(db: &Pool<Sqlite>) -> Result<Vec<KanbanStage>> {
    let rows = sqlx::query("SELECT * FROM kanban_stages ORDER BY position")
        .fetch_all(db)
        .await?;
    rows.iter().map(KanbanStage::from_row).collect()
}

pub async fn get_stage(db: &Pool<Sqlite>, id: Uuid) -> Result<KanbanStage> {
    let row = sqlx::query("SELECT * FROM kanban_stages WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Kanban stage {}", id)))?;
    KanbanStage::from_row(&row)
}

/// Stage with the lowest position, where new check-ins land
pub async fn first_stage(db: &Pool<Sqlite>) -> Result<Option<KanbanStage>> {
    let row = sqlx::query("SELECT * FROM kanban_stages ORDER BY position LIMIT 1")
        .fetch_optional(db)
        .await?;
    row.as_ref().map(KanbanStage::from_row).transpose()
}

/// Append a stage at the end of the board
pub async fn create_stage(
    db: &Pool<Sqlite>,
    name: &str,
    webhook_url: Option<&str>,
    calls_panel_id: Option<Uuid>,
) -> Result<KanbanStage> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Stage name is required".to_string()));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO kanban_stages (id, name, position, webhook_url, calls_panel_id, created_at)
         VALUES (?, ?, (SELECT COUNT(*) FROM kanban_stages), ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(name)
    .bind(webhook_url.map(str::trim).filter(|u| !u.is_empty()))
    .bind(calls_panel_id.map(|p| p.to_string()))
    .bind(format_timestamp(&Utc::now()))
    .execute(db)
    .await?;

    tracing::info!(stage = %name, "Created Kanban stage");
    get_stage(db, id).await
}

pub async fn update_stage(
    db: &Pool<Sqlite>,
    id: Uuid,
    name: &str,
    webhook_url: Option<&str>,
    calls_panel_id: Option<Uuid>,
) -> Result<KanbanStage> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Stage name is required".to_string()));
    }

    let result = sqlx::query(
        "UPDATE kanban_stages SET name = ?, webhook_url = ?, calls_panel_id = ? WHERE id = ?",
    )
    .bind(name)
    .bind(webhook_url.map(str::trim).filter(|u| !u.is_empty()))
    .bind(calls_panel_id.map(|p| p.to_string()))
    .bind(id.to_string())
    .execute(db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Kanban stage {}", id)));
    }
    get_stage(db, id).await
}

/// Delete an empty stage and close the gap it leaves
pub async fn delete_stage(db: &Pool<Sqlite>, id: Uuid) -> Result<()> {
    let mut tx = db.begin().await?;

    let (cards,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM kanban_cards WHERE stage_id = ?")
        .bind(id.to_string())
        .fetch_one(&mut *tx)
        .await?;
    if cards > 0 {
        return Err(Error::Conflict(format!(
            "Stage {} still holds {} card(s)",
            id, cards
        )));
    }

    let result = sqlx::query("DELETE FROM kanban_stages WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Kanban stage {}", id)));
    }

    let remaining = stage_order(&mut tx).await?;
    write_stage_positions(&mut tx, &remaining).await?;
    tx.commit().await?;
    Ok(())
}

/// Reorder the board. `order` must list every stage exactly once.
pub async fn reorder_stages(db: &Pool<Sqlite>, order: &[Uuid]) -> Result<Vec<KanbanStage>> {
    let mut tx = db.begin().await?;

    let current: HashSet<Uuid> = stage_order(&mut tx).await?.into_iter().collect();
    let requested: HashSet<Uuid> = order.iter().copied().collect();
    if requested.len() != order.len() || requested != current {
        return Err(Error::InvalidInput(
            "Stage order must list every stage exactly once".to_string(),
        ));
    }

    write_stage_positions(&mut tx, order).await?;
    tx.commit().await?;
    list_stages(db).await
}

async fn stage_order(conn: &mut SqliteConnection) -> Result<Vec<Uuid>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM kanban_stages ORDER BY position")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter()
        .map(|(id,)| mxc_common::db::parse_uuid(id))
        .collect()
}

async fn write_stage_positions(conn: &mut SqliteConnection, order: &[Uuid]) -> Result<()> {
    for (position, id) in order.iter().enumerate() {
        sqlx::query("UPDATE kanban_stages SET position = ? WHERE id = ?")
            .bind(position as i64)
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

// ============================================================================
// Cards
// ============================================================================

pub async fn list_cards(db: &Pool<Sqlite>, stage_id: Option<Uuid>) -> Result<Vec<KanbanCard>> {
    let rows = match stage_id {
        Some(stage_id) => {
            sqlx::query("SELECT * FROM kanban_cards WHERE stage_id = ? ORDER BY position")
                .bind(stage_id.to_string())
                .fetch_all(db)
                .await?
        }
        None => {
            sqlx::query(
                "SELECT c.* FROM kanban_cards c
                 JOIN kanban_stages s ON s.id = c.stage_id
                 ORDER BY s.position, c.position",
            )
            .fetch_all(db)
            .await?
        }
    };
    rows.iter().map(KanbanCard::from_row).collect()
}

pub async fn get_card(db: &Pool<Sqlite>, id: Uuid) -> Result<KanbanCard> {
    let row = sqlx::query("SELECT * FROM kanban_cards WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Kanban card {}", id)))?;
    KanbanCard::from_row(&row)
}

/// Append a card to the end of `stage_id`
pub async fn create_card(
    db: &Pool<Sqlite>,
    stage_id: Uuid,
    lead_id: i64,
    checkin_id: Option<i64>,
    title: &str,
) -> Result<KanbanCard> {
    get_stage(db, stage_id).await?;

    let id = Uuid::new_v4();
    let now = format_timestamp(&Utc::now());
    sqlx::query(
        "INSERT INTO kanban_cards (id, stage_id, lead_id, checkin_id, title, position, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, (SELECT COUNT(*) FROM kanban_cards WHERE stage_id = ?), ?, ?)",
    )
    .bind(id.to_string())
    .bind(stage_id.to_string())
    .bind(lead_id)
    .bind(checkin_id)
    .bind(title)
    .bind(stage_id.to_string())
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    get_card(db, id).await
}

async fn card_order(conn: &mut SqliteConnection, stage_id: Uuid) -> Result<Vec<Uuid>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT id FROM kanban_cards WHERE stage_id = ? ORDER BY position")
            .bind(stage_id.to_string())
            .fetch_all(&mut *conn)
            .await?;
    rows.iter()
        .map(|(id,)| mxc_common::db::parse_uuid(id))
        .collect()
}

async fn write_card_positions(
    conn: &mut SqliteConnection,
    stage_id: Uuid,
    order: &[Uuid],
    now: &str,
) -> Result<()> {
    for (position, id) in order.iter().enumerate() {
        sqlx::query("UPDATE kanban_cards SET stage_id = ?, position = ?, updated_at = ? WHERE id = ?")
            .bind(stage_id.to_string())
            .bind(position as i64)
            .bind(now)
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Move a card to `to_stage_id` at `position` (end of list when `None`).
///
/// Writes one audit event and, when the card enters a different stage that
/// is bound to a panel, one call row. The outbound webhook is fired by the
/// caller after commit; the event starts as `pending` when the target
/// stage has a webhook.
pub async fn move_card(
    db: &Pool<Sqlite>,
    card_id: Uuid,
    to_stage_id: Uuid,
    position: Option<usize>,
    moved_by: Option<&str>,
) -> Result<CardMove> {
    let card = get_card(db, card_id).await?;
    let to_stage = get_stage(db, to_stage_id).await?;
    let from_stage = card.stage_id;
    let now = Utc::now();
    let now_str = format_timestamp(&now);

    let mut tx = db.begin().await?;

    if from_stage != to_stage_id {
        let mut source = card_order(&mut tx, from_stage).await?;
        source.retain(|id| *id != card_id);
        write_card_positions(&mut tx, from_stage, &source, &now_str).await?;
    }

    let target = card_order(&mut tx, to_stage_id).await?;
    let index = position.unwrap_or(usize::MAX);
    let target = splice_order(target, card_id, index);
    write_card_positions(&mut tx, to_stage_id, &target, &now_str).await?;

    let webhook_status = to_stage.webhook_url.as_ref().map(|_| "pending");
    let event_id = sqlx::query(
        "INSERT INTO kanban_events (card_id, from_stage_id, to_stage_id, moved_by, webhook_status, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(card_id.to_string())
    .bind(from_stage.to_string())
    .bind(to_stage_id.to_string())
    .bind(moved_by)
    .bind(webhook_status)
    .bind(&now_str)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let mut call_id = None;
    if let Some(panel_id) = to_stage.calls_panel_id.filter(|_| from_stage != to_stage_id) {
        let id = sqlx::query(
            "INSERT INTO calls (panel_id, card_id, lead_id, model_name, called_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(panel_id.to_string())
        .bind(card_id.to_string())
        .bind(card.lead_id)
        .bind(&card.title)
        .bind(&now_str)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        call_id = Some(id);
    }

    tx.commit().await?;

    let event = get_event(db, event_id).await?;
    let call = match call_id {
        Some(id) => {
            let call = super::panels::get_call(db, id).await?;
            let panel = super::panels::get_panel(db, call.panel_id).await?;
            Some((call, panel))
        }
        None => None,
    };

    tracing::info!(
        card_id = %card_id,
        from_stage = %from_stage,
        to_stage = %to_stage_id,
        called = call.is_some(),
        "Moved Kanban card"
    );

    Ok(CardMove {
        card: get_card(db, card_id).await?,
        from_stage,
        to_stage,
        event,
        call,
    })
}

// ============================================================================
// Events
// ============================================================================

pub async fn get_event(db: &Pool<Sqlite>, id: i64) -> Result<KanbanEvent> {
    let row = sqlx::query("SELECT * FROM kanban_events WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Kanban event {}", id)))?;
    KanbanEvent::from_row(&row)
}

pub async fn list_events(db: &Pool<Sqlite>, card_id: Uuid) -> Result<Vec<KanbanEvent>> {
    let rows = sqlx::query("SELECT * FROM kanban_events WHERE card_id = ? ORDER BY id")
        .bind(card_id.to_string())
        .fetch_all(db)
        .await?;
    rows.iter().map(KanbanEvent::from_row).collect()
}

pub async fn set_webhook_status(db: &Pool<Sqlite>, event_id: i64, status: &str) -> Result<()> {
    sqlx::query("UPDATE kanban_events SET webhook_status = ? WHERE id = ?")
        .bind(status)
        .bind(event_id)
        .execute(db)
        .await?;
    Ok(())
}
