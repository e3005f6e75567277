//! Timestamp utilities
//!
//! Bitrix24 sends local wall-clock values without an offset. The agency is
//! in Sao Paulo, which has been fixed at UTC-03:00 since Brazil dropped
//! daylight saving in 2019.

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

const SAO_PAULO_OFFSET_SECS: i32 = -3 * 3600;

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d.%m.%Y", "%Y-%m-%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// America/Sao_Paulo as a fixed offset
pub fn sao_paulo() -> FixedOffset {
    FixedOffset::east_opt(SAO_PAULO_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn parse_crm_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| Error::InvalidInput(format!("Unrecognized date {:?}", raw)))
}

pub fn parse_crm_time(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| Error::InvalidInput(format!("Unrecognized time {:?}", raw)))
}

/// Interpret a naive Sao Paulo wall-clock value as UTC
pub fn sao_paulo_to_utc(local: NaiveDateTime) -> Result<DateTime<Utc>> {
    sao_paulo()
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidInput(format!("Ambiguous local time {}", local)))
}

/// Parse a combined CRM date-time string.
///
/// Accepts RFC 3339 (offset honored), `"<date> <time>"`, `"<date>T<time>"`
/// and a bare date (midnight local).
pub fn parse_crm_datetime(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let (date_part, time_part) = match raw.split_once(&[' ', 'T'][..]) {
        Some((d, t)) => (d, Some(t)),
        None => (raw, None),
    };

    let date = parse_crm_date(date_part)?;
    let time = match time_part {
        Some(t) => parse_crm_time(t)?,
        None => NaiveTime::MIN,
    };
    sao_paulo_to_utc(date.and_time(time))
}

/// Combine separate CRM date and time fields
pub fn parse_crm_date_and_time(date: &str, time: Option<&str>) -> Result<DateTime<Utc>> {
    let date = parse_crm_date(date)?;
    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => parse_crm_time(t)?,
        None => NaiveTime::MIN,
    };
    sao_paulo_to_utc(date.and_time(time))
}
