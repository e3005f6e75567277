//! # MaxCheckin Common Library
//!
//! Shared code for the MaxCheckin kiosk binaries:
//! - Database schema, models and initialization
//! - Event types (MxcEvent) and the broadcast EventBus
//! - Configuration loading (CLI → ENV → TOML → defaults)
//! - Lead input normalization (QR / barcode / manual entry) and the scan cooldown
//! - CRM date/time parsing in the Sao Paulo offset
//! - Bounded retry policies

pub mod config;
pub mod db;
pub mod debounce;
pub mod error;
pub mod events;
pub mod lead_input;
pub mod retry;
pub mod sse;
pub mod time;

pub use debounce::ScanDebouncer;
pub use error::{Error, Result};
pub use lead_input::LeadInput;
