//! Check-in state machine
//!
//! ```text
//! Scanning → Fetching → Review → Confirming → Done
//!               │                    │
//!               └──────→ Error ←─────┘
//! ```
//!
//! `dismiss` returns to `Scanning` from any state. The flow itself does no
//! I/O; [`crate::services::checkin`] drives it around the CRM and database
//! calls and releases the lock while those calls are in flight, so
//! `Fetching` and `Confirming` are observable.

use super::mapping::MappedLead;
use crate::crm::CrmError;
use mxc_common::db::CheckIn;
use mxc_common::ScanDebouncer;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    InvalidInput(String),

    /// Operation not legal in the current state
    #[error("{0}")]
    InvalidState(String),

    #[error(transparent)]
    Crm(#[from] CrmError),

    #[error(transparent)]
    Storage(#[from] mxc_common::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    Scanning,
    Fetching {
        lead_id: u64,
    },
    Review {
        lead: MappedLead,
        /// Most recent earlier check-in for the same lead
        prior: Option<CheckIn>,
    },
    Confirming {
        lead: MappedLead,
        prior: Option<CheckIn>,
    },
    Done {
        checkin: CheckIn,
        /// Set when a deal was created for an additional model
        new_deal_id: Option<u64>,
        /// Non-fatal CRM write-back failure
        warning: Option<String>,
    },
    Error {
        message: String,
    },
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Scanning => "scanning",
            FlowState::Fetching { .. } => "fetching",
            FlowState::Review { .. } => "review",
            FlowState::Confirming { .. } => "confirming",
            FlowState::Done { .. } => "done",
            FlowState::Error { .. } => "error",
        }
    }
}

/// Operator decision in `Review`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfirmChoice {
    /// No earlier check-in exists for the lead
    First,
    /// Check the same model in again
    ReconfirmSame,
    /// Register another model under the same lead, cloning its deal
    AdditionalModel {
        model_name: String,
        model_photo: Option<String>,
    },
}

/// Result of a successful confirmation, recorded into `Done`
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub checkin: CheckIn,
    pub new_deal_id: Option<u64>,
    pub warning: Option<String>,
}

/// One kiosk's check-in flow
#[derive(Debug)]
pub struct CheckinFlow {
    state: FlowState,
    debouncer: ScanDebouncer,
}

impl CheckinFlow {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: FlowState::Scanning,
            debouncer: ScanDebouncer::new(cooldown),
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Whether the scan cooldown lets a raw trigger through
    pub fn trigger_allowed(&self, code: &str, now: Instant) -> bool {
        self.debouncer.would_accept(code.trim(), now)
    }

    /// Start the cooldown window for a trigger that was acted on
    pub fn record_trigger(&mut self, code: &str, now: Instant) {
        self.debouncer.record(code.trim(), now);
    }

    /// Start fetching `lead_id`. Legal from `Scanning`, `Done` and `Error`.
    pub fn begin_fetch(&mut self, lead_id: u64) -> Result<(), FlowError> {
        match self.state {
            FlowState::Scanning | FlowState::Done { .. } | FlowState::Error { .. } => {
                self.state = FlowState::Fetching { lead_id };
                Ok(())
            }
            _ => Err(self.illegal("scan")),
        }
    }

    /// Record the fetch result. Ignored unless still fetching `lead_id`.
    pub fn finish_fetch(
        &mut self,
        lead_id: u64,
        result: Result<(MappedLead, Option<CheckIn>), &FlowError>,
    ) {
        if self.state != (FlowState::Fetching { lead_id }) {
            tracing::debug!(lead_id, state = self.state.name(), "Discarding stale fetch result");
            return;
        }
        self.state = match result {
            Ok((lead, prior)) => FlowState::Review { lead, prior },
            Err(e) => FlowState::Error { message: e.to_string() },
        };
    }

    /// Validate `choice` against the reviewed lead and enter `Confirming`.
    ///
    /// On error the flow stays in `Review`.
    pub fn begin_confirm(&mut self, choice: &ConfirmChoice) -> Result<(MappedLead, Option<CheckIn>), FlowError> {
        let (lead, prior) = match &self.state {
            FlowState::Review { lead, prior } => (lead.clone(), prior.clone()),
            _ => return Err(self.illegal("confirm")),
        };

        match (choice, &prior) {
            (ConfirmChoice::First, Some(p)) => {
                return Err(FlowError::InvalidState(format!(
                    "Lead {} already checked in at {}",
                    lead.lead_id, p.checked_in_at
                )))
            }
            (ConfirmChoice::ReconfirmSame | ConfirmChoice::AdditionalModel { .. }, None) => {
                return Err(FlowError::InvalidState(format!(
                    "Lead {} has no earlier check-in",
                    lead.lead_id
                )))
            }
            (ConfirmChoice::AdditionalModel { model_name, .. }, Some(_)) if model_name.trim().is_empty() => {
                return Err(FlowError::InvalidInput("Model name is required".to_string()))
            }
            _ => {}
        }

        self.state = FlowState::Confirming {
            lead: lead.clone(),
            prior: prior.clone(),
        };
        Ok((lead, prior))
    }

    /// Record the confirmation result. Ignored unless confirming.
    pub fn finish_confirm(&mut self, result: Result<ConfirmOutcome, &FlowError>) {
        if !matches!(self.state, FlowState::Confirming { .. }) {
            tracing::debug!(state = self.state.name(), "Discarding stale confirm result");
            return;
        }
        self.state = match result {
            Ok(outcome) => FlowState::Done {
                checkin: outcome.checkin,
                new_deal_id: outcome.new_deal_id,
                warning: outcome.warning,
            },
            Err(e) => FlowState::Error { message: e.to_string() },
        };
    }

    /// Back to `Scanning` from anywhere
    pub fn dismiss(&mut self) {
        self.state = FlowState::Scanning;
    }

    fn illegal(&self, operation: &str) -> FlowError {
        FlowError::InvalidState(format!(
            "Cannot {} while {}",
            operation,
            self.state.name()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn lead(id: u64) -> MappedLead {
        MappedLead {
            lead_id: id,
            model_name: "Ana".to_string(),
            model_photo: None,
            responsible: None,
            deal_id: None,
        }
    }

    fn checkin(id: i64, lead_id: i64) -> CheckIn {
        CheckIn {
            id,
            lead_id,
            model_name: "Ana".to_string(),
            model_photo: None,
            responsible: None,
            deal_id: None,
            checked_in_at: Utc::now(),
        }
    }

    fn outcome(c: CheckIn) -> ConfirmOutcome {
        ConfirmOutcome { checkin: c, new_deal_id: None, warning: None }
    }

    #[test]
    fn test_happy_path() {
        let mut flow = CheckinFlow::new(Duration::from_millis(3000));
        flow.begin_fetch(5).unwrap();
        assert_eq!(flow.state().name(), "fetching");

        flow.finish_fetch(5, Ok((lead(5), None)));
        assert_eq!(flow.state().name(), "review");

        flow.begin_confirm(&ConfirmChoice::First).unwrap();
        assert_eq!(flow.state().name(), "confirming");

        flow.finish_confirm(Ok(outcome(checkin(1, 5))));
        assert_eq!(flow.state().name(), "done");
    }

    #[test]
    fn test_confirm_only_once() {
        let mut flow = CheckinFlow::new(Duration::from_millis(3000));
        flow.begin_fetch(5).unwrap();
        flow.finish_fetch(5, Ok((lead(5), None)));
        flow.begin_confirm(&ConfirmChoice::First).unwrap();
        assert!(matches!(
            flow.begin_confirm(&ConfirmChoice::First),
            Err(FlowError::InvalidState(_))
        ));
        flow.finish_confirm(Ok(outcome(checkin(1, 5))));
        assert!(flow.begin_confirm(&ConfirmChoice::First).is_err());
    }

    #[test]
    fn test_choice_must_match_prior() {
        let mut flow = CheckinFlow::new(Duration::from_millis(3000));
        flow.begin_fetch(5).unwrap();
        flow.finish_fetch(5, Ok((lead(5), Some(checkin(1, 5)))));

        assert!(flow.begin_confirm(&ConfirmChoice::First).is_err());
        let blank = ConfirmChoice::AdditionalModel { model_name: " ".into(), model_photo: None };
        assert!(matches!(flow.begin_confirm(&blank), Err(FlowError::InvalidInput(_))));
        assert_eq!(flow.state().name(), "review");

        flow.begin_confirm(&ConfirmChoice::ReconfirmSame).unwrap();
    }

    #[test]
    fn test_reconfirm_requires_prior() {
        let mut flow = CheckinFlow::new(Duration::from_millis(3000));
        flow.begin_fetch(5).unwrap();
        flow.finish_fetch(5, Ok((lead(5), None)));
        assert!(flow.begin_confirm(&ConfirmChoice::ReconfirmSame).is_err());
    }

    #[test]
    fn test_fetch_failure_enters_error_then_dismiss() {
        let mut flow = CheckinFlow::new(Duration::from_millis(3000));
        flow.begin_fetch(5).unwrap();
        let err = FlowError::Crm(CrmError::NotFound("lead 5".into()));
        flow.finish_fetch(5, Err(&err));
        assert!(matches!(flow.state(), FlowState::Error { message } if message.contains("lead 5")));

        flow.dismiss();
        assert_eq!(flow.state(), &FlowState::Scanning);
    }

    #[test]
    fn test_scan_rejected_while_reviewing() {
        let mut flow = CheckinFlow::new(Duration::from_millis(3000));
        flow.begin_fetch(5).unwrap();
        assert!(flow.begin_fetch(6).is_err());
        flow.finish_fetch(5, Ok((lead(5), None)));
        assert!(flow.begin_fetch(6).is_err());
    }

    #[test]
    fn test_stale_fetch_result_ignored() {
        let mut flow = CheckinFlow::new(Duration::from_millis(3000));
        flow.begin_fetch(5).unwrap();
        flow.dismiss();
        flow.finish_fetch(5, Ok((lead(5), None)));
        assert_eq!(flow.state(), &FlowState::Scanning);
    }

    #[test]
    fn test_trigger_cooldown() {
        let mut flow = CheckinFlow::new(Duration::from_millis(3000));
        let t0 = Instant::now();
        assert!(flow.trigger_allowed("123", t0));
        flow.record_trigger("123", t0);
        assert!(!flow.trigger_allowed(" 123 ", t0 + Duration::from_millis(100)));
        assert!(flow.trigger_allowed("123", t0 + Duration::from_millis(3000)));
    }
}
