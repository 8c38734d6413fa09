// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use shared_models::{AppError, FieldErrors};
use shared_utils::validation::{is_iso_date, is_valid_email, FieldValidator};
use tebra_cell::services::mapping::parse_instant;

use crate::models::{BookingError, BookingRequest};
use crate::services::availability::{format_slot_date, format_slot_time};
use crate::services::booking::{BookingService, MAX_NAME_LENGTH, MAX_NOTES_LENGTH, MAX_PHONE_LENGTH};

const NOT_AVAILABLE: &str = "Online booking is not available at this time";
const DEFAULT_DATE_RANGE_DAYS: u32 = 30;
const MAX_DATE_RANGE_DAYS: u32 = 90;
const MIN_PHONE_LENGTH: usize = 10;

pub struct AppointmentState {
    pub booking: Arc<BookingService>,
}

impl AppointmentState {
    pub fn new(booking: Arc<BookingService>) -> Self {
        Self { booking }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableDatesQuery {
    pub start: Option<String>,
    /// Kept as text so a bad value gets the JSON error envelope.
    pub days: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPayload {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub appointment_reason_id: Option<String>,
    pub start_time: Option<String>,
    pub notes: Option<String>,
    pub provider_id: Option<String>,
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let booking = &state.booking;

    if !booking.is_configured() {
        return Err(AppError::ServiceUnavailable(NOT_AVAILABLE.to_string()));
    }

    let date = query
        .date
        .as_deref()
        .map(str::trim)
        .and_then(parse_iso_date)
        .ok_or_else(|| AppError::BadRequest("A valid date (YYYY-MM-DD) is required".to_string()))?;

    let reason_id = query
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::BadRequest("An appointment reason is required".to_string()))?;

    // Lookup failures degrade to "no slots" so the date picker keeps working.
    let slots = match booking.get_available_slots(date, reason_id).await {
        Ok(slots) => slots,
        Err(e) => {
            warn!("Availability lookup for {} failed, returning no slots: {}", date, e);
            Vec::new()
        }
    };

    let offset = booking.clinic_offset();
    let rendered: Vec<Value> = slots
        .iter()
        .map(|slot| {
            json!({
                "startTime": slot.start_time,
                "endTime": slot.end_time,
                "providerId": slot.provider_id,
                "providerName": slot.provider_name,
                "displayTime": format_slot_time(slot.start_time, offset),
                "displayDate": format_slot_date(slot.start_time, offset),
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "date": date.format("%Y-%m-%d").to_string(),
            "slots": rendered,
            "totalSlots": rendered.len(),
        }
    })))
}

pub async fn get_available_dates(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<AvailableDatesQuery>,
) -> Result<Json<Value>, AppError> {
    let booking = &state.booking;
    let offset = booking.clinic_offset();

    let start = match query.start.as_deref().map(str::trim) {
        Some(raw) => parse_iso_date(raw)
            .ok_or_else(|| AppError::BadRequest("start must be a date (YYYY-MM-DD)".to_string()))?,
        None => booking.now().with_timezone(&offset).date_naive(),
    };
    let days = match query.days.as_deref().map(str::trim) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| AppError::BadRequest("days must be a positive number".to_string()))?,
        None => DEFAULT_DATE_RANGE_DAYS,
    }
    .min(MAX_DATE_RANGE_DAYS);

    let dates: Vec<Value> = booking
        .engine()
        .available_dates(start, days)
        .into_iter()
        .map(|date| {
            json!({
                "date": date.format("%Y-%m-%d").to_string(),
                "displayDate": date.format("%A, %B %-d, %Y").to_string(),
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "dates": dates,
            "totalDates": dates.len(),
        }
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let booking = &state.booking;

    if !booking.is_configured() {
        return Err(AppError::ServiceUnavailable(NOT_AVAILABLE.to_string()));
    }

    let payload: BookingPayload = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Invalid request body".to_string()))?;

    let request = validate_payload(payload, booking.now(), booking.clinic_offset())
        .map_err(|errors| AppError::validation("Validation failed", errors))?;

    let result = booking
        .book_appointment(request)
        .await
        .map_err(booking_error_response)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "appointmentId": result.appointment_id,
            "confirmation": result.confirmation,
        },
        "message": "Your appointment has been booked",
    })))
}

pub async fn get_bootstrap(State(state): State<Arc<AppointmentState>>) -> Result<Json<Value>, AppError> {
    let booking = &state.booking;

    if !booking.is_configured() {
        return Err(AppError::ServiceUnavailable(NOT_AVAILABLE.to_string()));
    }

    let cache = booking.cache();
    let snapshot = cache.get_snapshot().await.map_err(|e| {
        error!("Bootstrap load failed: {}", e);
        AppError::Internal("Failed to load clinic configuration".to_string())
    })?;
    let status = cache.status().await;

    let providers: Vec<Value> = snapshot
        .providers
        .iter()
        .map(|p| json!({ "id": p.id, "name": p.full_name }))
        .collect();
    let reasons: Vec<Value> = snapshot
        .appointment_reasons
        .iter()
        .map(|r| json!({ "id": r.id, "name": r.name, "duration": r.duration_minutes }))
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "practices": snapshot.practices,
            "serviceLocations": snapshot.service_locations,
            "providers": providers,
            "appointmentReasons": reasons,
            "cache": {
                "isCached": status.is_cached,
                "expiresIn": status.time_remaining.num_milliseconds(),
            }
        }
    })))
}

// ==============================================================================
// HELPERS
// ==============================================================================

fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    if !is_iso_date(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Schema check for the public booking form. Names and notes are trimmed and
/// the email is lower-cased. A start time without an offset is read at the
/// clinic's `offset`.
pub fn validate_payload(
    payload: BookingPayload,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<BookingRequest, FieldErrors> {
    let mut validator = FieldValidator::new();

    let first_name = payload.first_name.unwrap_or_default().trim().to_string();
    validator.check_length("firstName", &first_name, 1, MAX_NAME_LENGTH, "First name");

    let last_name = payload.last_name.unwrap_or_default().trim().to_string();
    validator.check_length("lastName", &last_name, 1, MAX_NAME_LENGTH, "Last name");

    let date_of_birth = payload.date_of_birth.unwrap_or_default().trim().to_string();
    if parse_iso_date(&date_of_birth).is_none() {
        validator.add("dateOfBirth", "Date of birth must be YYYY-MM-DD");
    }

    let email = payload.email.unwrap_or_default().trim().to_lowercase();
    if !is_valid_email(&email) {
        validator.add("email", "A valid email address is required");
    }

    let phone = payload.phone.unwrap_or_default().trim().to_string();
    validator.check_length("phone", &phone, MIN_PHONE_LENGTH, MAX_PHONE_LENGTH, "Phone number");

    let appointment_reason_id = payload
        .appointment_reason_id
        .unwrap_or_default()
        .trim()
        .to_string();
    if appointment_reason_id.is_empty() {
        validator.add("appointmentReasonId", "Please select an appointment type");
    }

    let start_time = payload
        .start_time
        .as_deref()
        .and_then(|raw| parse_instant(raw.trim(), offset));
    match start_time {
        None => validator.add("startTime", "A valid appointment time is required"),
        Some(t) if t <= now => validator.add("startTime", "Appointment time must be in the future"),
        Some(_) => {}
    }

    let notes = payload
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if notes
        .as_ref()
        .is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH)
    {
        validator.add("notes", "Notes must be 500 characters or fewer");
    }

    match start_time {
        Some(start_time) if validator.is_empty() => Ok(BookingRequest {
            first_name,
            last_name,
            date_of_birth,
            email,
            phone,
            appointment_reason_id,
            start_time,
            notes,
            provider_id: payload
                .provider_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        }),
        _ => Err(validator.into_errors()),
    }
}

fn booking_error_response(err: BookingError) -> AppError {
    match err {
        BookingError::Validation { field, message } => {
            let mut errors = FieldErrors::new();
            errors.insert(field, vec![message]);
            AppError::validation("Validation failed", errors)
        }
        BookingError::InvalidReason(_) => AppError::BadRequest("Invalid appointment type".to_string()),
        BookingError::SlotNoLongerAvailable => AppError::Conflict(
            "That time was just booked. Please choose another slot.".to_string(),
        ),
        BookingError::NotConfigured => AppError::ServiceUnavailable(NOT_AVAILABLE.to_string()),
        BookingError::Configuration(detail) => {
            error!("Booking unavailable: {}", detail);
            AppError::ServiceUnavailable(NOT_AVAILABLE.to_string())
        }
        BookingError::PatientCreation(message) | BookingError::AppointmentCreation(message) => {
            AppError::Internal(message)
        }
        BookingError::Remote { stage, source } => {
            error!("Booking failed while {}: {}", stage, source);
            AppError::Internal(
                "We could not complete your booking. Please try again or call the clinic.".to_string(),
            )
        }
    }
}
