//! Check-in reconciliation: field mapping and the per-kiosk state machine

pub mod flow;
pub mod mapping;

pub use flow::{CheckinFlow, ConfirmChoice, ConfirmOutcome, FlowError, FlowState};
pub use mapping::{map_lead, MappedLead};
