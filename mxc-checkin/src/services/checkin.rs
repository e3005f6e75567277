//! Check-in orchestration
//!
//! Drives the per-kiosk [`CheckinFlow`] around the CRM and database calls.
//! The flow lock is held only for state transitions, never across a
//! network call.

use crate::checkin::mapping::{cloned_deal_fields, map_lead, writeback_fields, MappedLead};
use crate::checkin::{CheckinFlow, ConfirmChoice, ConfirmOutcome, FlowError, FlowState};
use crate::crm::{search_by_phone, LeadCandidate};
use crate::db::checkins::{self, NewCheckIn};
use crate::db::mappings;
use crate::AppState;
use chrono::Utc;
use mxc_common::db::CheckIn;
use mxc_common::events::MxcEvent;
use mxc_common::lead_input::normalize_lead_input;
use mxc_common::LeadInput;
use serde::Serialize;
use std::time::Instant;

/// What a scan or search produced
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Same code within the cooldown window
    Suppressed,
    /// Phone input: leads for the operator to pick from
    Candidates(Vec<LeadCandidate>),
    /// Lead input: the flow state after the fetch
    Flow(FlowState),
}

fn parse_input(raw: &str) -> Result<LeadInput, FlowError> {
    normalize_lead_input(raw).map_err(|e| match e {
        mxc_common::Error::InvalidInput(msg) => FlowError::InvalidInput(msg),
        other => FlowError::Storage(other),
    })
}

/// Handle a scanner or QR trigger
///
/// The cooldown window only starts once the trigger has been acted on, so a
/// scan rejected by the flow state can be repeated right away.
pub async fn scan(state: &AppState, code: &str) -> Result<ScanOutcome, FlowError> {
    let now = Instant::now();
    if !state.flow.lock().await.trigger_allowed(code, now) {
        tracing::debug!(code = %code.trim(), "Scan suppressed by cooldown");
        return Ok(ScanOutcome::Suppressed);
    }
    dispatch(state, parse_input(code)?, Some((code, now))).await
}

/// Handle manual entry (lead ID, lead URL or phone); no cooldown applies
pub async fn search(state: &AppState, query: &str) -> Result<ScanOutcome, FlowError> {
    dispatch(state, parse_input(query)?, None).await
}

async fn dispatch(
    state: &AppState,
    input: LeadInput,
    trigger: Option<(&str, Instant)>,
) -> Result<ScanOutcome, FlowError> {
    match input {
        LeadInput::Phone(phone) => {
            if let Some((code, at)) = trigger {
                state.flow.lock().await.record_trigger(code, at);
            }
            let candidates = search_by_phone(state.crm.as_ref(), &phone).await?;
            Ok(ScanOutcome::Candidates(candidates))
        }
        LeadInput::LeadId(lead_id) => fetch_lead(state, lead_id, trigger)
            .await
            .map(ScanOutcome::Flow),
    }
}

async fn fetch_lead(
    state: &AppState,
    lead_id: u64,
    trigger: Option<(&str, Instant)>,
) -> Result<FlowState, FlowError> {
    {
        let mut flow = state.flow.lock().await;
        flow.begin_fetch(lead_id)?;
        if let Some((code, at)) = trigger {
            flow.record_trigger(code, at);
        }
    }
    tracing::info!(lead_id, "Fetching lead");

    let result = load_review(state, lead_id).await;

    let mut flow = state.flow.lock().await;
    match result {
        Ok(review) => {
            flow.finish_fetch(lead_id, Ok(review));
            Ok(flow.state().clone())
        }
        Err(e) => {
            tracing::warn!(lead_id, error = %e, "Lead fetch failed");
            flow.finish_fetch(lead_id, Err(&e));
            Err(e)
        }
    }
}

async fn load_review(
    state: &AppState,
    lead_id: u64,
) -> Result<(MappedLead, Option<CheckIn>), FlowError> {
    let record = state.crm.get_lead(lead_id).await?;
    let active = mappings::active_mappings(&state.db).await?;
    let lead = map_lead(lead_id, &record, &active);
    let prior = checkins::latest_for_lead(&state.db, lead_id as i64).await?;
    Ok((lead, prior))
}

/// Confirm the reviewed lead
pub async fn confirm(state: &AppState, choice: ConfirmChoice) -> Result<FlowState, FlowError> {
    let (lead, prior) = state.flow.lock().await.begin_confirm(&choice)?;

    let result = perform_confirm(state, &lead, prior.as_ref(), &choice).await;

    let mut flow = state.flow.lock().await;
    match result {
        Ok(outcome) => {
            flow.finish_confirm(Ok(outcome));
            Ok(flow.state().clone())
        }
        Err(e) => {
            tracing::warn!(lead_id = lead.lead_id, error = %e, "Check-in failed");
            flow.finish_confirm(Err(&e));
            Err(e)
        }
    }
}

async fn perform_confirm(
    state: &AppState,
    lead: &MappedLead,
    prior: Option<&CheckIn>,
    choice: &ConfirmChoice,
) -> Result<ConfirmOutcome, FlowError> {
    let active = mappings::active_mappings(&state.db).await?;
    let lead_id = lead.lead_id as i64;
    let known_deal = lead
        .deal_id
        .map(|id| id as i64)
        .or_else(|| prior.and_then(|p| p.deal_id));

    let mut new = NewCheckIn {
        lead_id,
        model_name: lead.model_name.clone(),
        model_photo: lead.model_photo.clone(),
        responsible: lead.responsible.clone(),
        deal_id: known_deal,
        checked_in_at: Utc::now(),
    };

    let (checkin, new_deal_id) = match choice {
        ConfirmChoice::First => (checkins::insert_first_checkin(&state.db, &new).await?, None),
        ConfirmChoice::ReconfirmSame => (checkins::insert_checkin(&state.db, &new).await?, None),
        ConfirmChoice::AdditionalModel { model_name, model_photo } => {
            let model_name = model_name.trim();
            let source = match known_deal {
                Some(deal_id) => Some(state.crm.get_deal(deal_id as u64).await?),
                None => None,
            };
            let deal_id = state
                .crm
                .add_deal(cloned_deal_fields(source.as_ref(), lead.lead_id, model_name))
                .await?;

            new.model_name = model_name.to_string();
            new.model_photo = model_photo.clone().filter(|p| !p.trim().is_empty());
            new.deal_id = Some(deal_id as i64);
            (checkins::insert_checkin(&state.db, &new).await?, Some(deal_id))
        }
    };

    tracing::info!(
        checkin_id = checkin.id,
        lead_id,
        model = %checkin.model_name,
        "Check-in saved"
    );

    let warning = write_back(state, &active, &checkin).await;

    if let Err(e) = super::kanban::add_checkin_card(state, &checkin).await {
        tracing::warn!(checkin_id = checkin.id, error = %e, "Failed to add check-in to board");
    }

    state.events.emit_lossy(MxcEvent::CheckinCompleted {
        checkin_id: checkin.id,
        lead_id,
        model_name: checkin.model_name.clone(),
        crm_sync_failed: warning.is_some(),
        timestamp: Utc::now(),
    });

    Ok(ConfirmOutcome {
        checkin,
        new_deal_id,
        warning,
    })
}

/// Push the check-in back to the CRM. A failure here does not undo the
/// local save; it becomes the warning shown with `Done`.
async fn write_back(
    state: &AppState,
    active: &[mxc_common::db::FieldMapping],
    checkin: &CheckIn,
) -> Option<String> {
    let fields = writeback_fields(active, &checkin.checked_in_at, checkin.model_photo.as_deref());
    if fields.is_empty() {
        tracing::debug!(lead_id = checkin.lead_id, "No write-back fields mapped");
        return None;
    }

    match state.crm.update_lead(checkin.lead_id as u64, fields).await {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(lead_id = checkin.lead_id, error = %e, "CRM write-back failed");
            Some(format!("Check-in saved, but updating the CRM failed: {}", e))
        }
    }
}

pub async fn dismiss(state: &AppState) -> FlowState {
    let mut flow = state.flow.lock().await;
    flow.dismiss();
    flow.state().clone()
}

pub async fn current_state(state: &AppState) -> FlowState {
    state.flow.lock().await.state().clone()
}

/// Fresh flow for a kiosk
pub fn new_flow(scan_cooldown_ms: u64) -> CheckinFlow {
    CheckinFlow::new(std::time::Duration::from_millis(scan_cooldown_ms))
}
