//! Lead input normalization
//!
//! The kiosk receives lead identifiers three ways: a QR code (usually the
//! Bitrix24 lead URL), a USB barcode scanner (the bare ID), or manual entry
//! (an ID or a phone number). All of them funnel through
//! [`normalize_lead_input`] before any network call is made.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Lead IDs above 9 digits are treated as phone numbers
const MAX_LEAD_ID_DIGITS: usize = 9;
const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 13;

static LEAD_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/crm/lead/(?:details|show)/(\d+)/?(?:[?#].*)?$")
        .expect("lead URL pattern is valid")
});

/// A normalized kiosk input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LeadInput {
    /// CRM lead ID
    LeadId(u64),
    /// Phone number, digits only (country code kept when given)
    Phone(String),
}

/// Reduce a CRM lead detail URL to its trailing numeric ID.
///
/// Any other input is returned trimmed but otherwise unchanged.
pub fn extract_lead_id(raw: &str) -> String {
    let trimmed = raw.trim();
    match LEAD_URL.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

/// Validate a lead ID string: digits only, positive, at most 9 digits
pub fn validate_lead_id(candidate: &str) -> Result<u64> {
    if candidate.is_empty() || !candidate.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidInput(format!(
            "Lead ID must be a positive integer, got {:?}",
            candidate
        )));
    }
    if candidate.len() > MAX_LEAD_ID_DIGITS {
        return Err(Error::InvalidInput(format!(
            "Lead ID {:?} is too long",
            candidate
        )));
    }

    let id: u64 = candidate
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Invalid lead ID {:?}", candidate)))?;
    if id == 0 {
        return Err(Error::InvalidInput("Lead ID must be greater than zero".to_string()));
    }
    Ok(id)
}

/// Strip phone punctuation; `None` unless the result is a plausible number
pub fn normalize_phone(raw: &str) -> Option<String> {
    let mut digits = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        match c {
            '0'..='9' => digits.push(c),
            '+' | '(' | ')' | '-' | '.' | ' ' => {}
            _ => return None,
        }
    }
    if (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        Some(digits)
    } else {
        None
    }
}

/// Normalize raw kiosk input into a lead ID or a phone number
pub fn normalize_lead_input(raw: &str) -> Result<LeadInput> {
    let trimmed = raw.trim();
    if let Some(caps) = LEAD_URL.captures(trimmed) {
        return validate_lead_id(&caps[1]).map(LeadInput::LeadId);
    }

    let candidate = trimmed.to_string();
    if candidate.is_empty() {
        return Err(Error::InvalidInput("Empty input".to_string()));
    }

    let all_digits = candidate.bytes().all(|b| b.is_ascii_digit());
    if all_digits && candidate.len() <= MAX_LEAD_ID_DIGITS {
        return validate_lead_id(&candidate).map(LeadInput::LeadId);
    }

    if let Some(phone) = normalize_phone(&candidate) {
        return Ok(LeadInput::Phone(phone));
    }

    Err(Error::InvalidInput(format!(
        "Not a lead ID, lead URL or phone number: {:?}",
        raw.trim()
    )))
}
