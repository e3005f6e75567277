//! Appointment webhook and the day's appointment list
//!
//! The CRM calls `/webhooks/appointment` with the lead and its scheduled
//! visit, either as query parameters, a JSON body or a form body. Keys come
//! in English or Portuguese; naive dates are Sao Paulo local time.

use super::auth::CurrentUser;
use crate::crm::coerce::coerce_scalar;
use crate::db::appointments::{self, NewAppointment};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Form, FromRequest, Query, Request, State},
    http::{header, Method},
    routing::get,
    Json, Router,
};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use mxc_common::db::Appointment;
use mxc_common::lead_input::{extract_lead_id, validate_lead_id};
use mxc_common::time::{parse_crm_date, parse_crm_date_and_time, parse_crm_datetime, sao_paulo, sao_paulo_to_utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

const LEAD_ID_KEYS: &[&str] = &["lead_id", "id", "data[FIELDS][ID]"];
const NAME_KEYS: &[&str] = &["name", "nome"];
const PHONE_KEYS: &[&str] = &["phone", "telefone"];
const DATE_KEYS: &[&str] = &["date", "data"];
const TIME_KEYS: &[&str] = &["time", "hora"];
const DATETIME_KEYS: &[&str] = &["datetime"];

/// First non-empty value among `keys`
fn field(params: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| params.get(*key).and_then(coerce_scalar))
}

/// Build the appointment row from the merged webhook parameters
pub fn parse_appointment(params: Map<String, Value>) -> Result<NewAppointment, ApiError> {
    let raw_lead = field(&params, LEAD_ID_KEYS)
        .ok_or_else(|| ApiError::BadRequest("lead_id is required".to_string()))?;
    let lead_id = validate_lead_id(&extract_lead_id(&raw_lead))?;

    let scheduled_at = match field(&params, DATETIME_KEYS) {
        Some(datetime) => parse_crm_datetime(&datetime)?,
        None => {
            let date = field(&params, DATE_KEYS)
                .ok_or_else(|| ApiError::BadRequest("date or datetime is required".to_string()))?;
            let time = field(&params, TIME_KEYS);
            parse_crm_date_and_time(&date, time.as_deref())?
        }
    };

    Ok(NewAppointment {
        lead_id: lead_id as i64,
        client_name: field(&params, NAME_KEYS),
        phone: field(&params, PHONE_KEYS),
        scheduled_at,
        raw_payload: Value::Object(params),
    })
}

/// Merge query parameters with a JSON or form body; body keys win
async fn collect_params(state: &AppState, request: Request) -> Result<Map<String, Value>, ApiError> {
    let mut params: Map<String, Value> = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map(|Query(q)| q.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
        .unwrap_or_default();

    if request.method() != Method::POST {
        return Ok(params);
    }

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        let Json(body) = Json::<Value>::from_request(request, state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
        match body {
            Value::Object(map) => params.extend(map),
            Value::Null => {}
            _ => return Err(ApiError::BadRequest("JSON body must be an object".to_string())),
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<HashMap<String, String>>::from_request(request, state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid form body: {}", e)))?;
        params.extend(form.into_iter().map(|(k, v)| (k, Value::String(v))));
    }

    Ok(params)
}

/// GET|POST /webhooks/appointment
pub async fn appointment_webhook(State(state): State<AppState>, request: Request) -> ApiResult<Json<Appointment>> {
    let params = collect_params(&state, request).await?;
    let new = parse_appointment(params)?;
    let appointment = appointments::upsert_appointment(&state.db, &new).await?;

    tracing::info!(
        lead_id = appointment.lead_id,
        scheduled_at = %appointment.scheduled_at,
        "Appointment received"
    );
    Ok(Json(appointment))
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    /// Sao Paulo calendar day; today when omitted
    pub date: Option<String>,
}

/// GET /api/appointments?date=
pub async fn list_appointments(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<AppointmentListQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    let day: NaiveDate = match query.date.as_deref() {
        Some(raw) => parse_crm_date(raw)?,
        None => Utc::now().with_timezone(&sao_paulo()).date_naive(),
    };
    let start = sao_paulo_to_utc(day.and_time(NaiveTime::MIN))?;
    let end = start + Duration::days(1);
    Ok(Json(appointments::list_between(&state.db, start, end).await?))
}

pub fn appointment_routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks/appointment", get(appointment_webhook).post(appointment_webhook))
        .route("/api/appointments", get(list_appointments))
}
