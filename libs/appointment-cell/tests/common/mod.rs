#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use appointment_cell::models::BookingRequest;
use appointment_cell::services::booking::BookingService;
use shared_utils::test_utils::TestConfig;
use shared_utils::ManualClock;
use tebra_cell::{
    Appointment, AppointmentReason, AppointmentStatus, MockPracticeApi, Practice, Provider,
    ServiceLocation,
};

/// Monday 2030-06-03 12:00 UTC.
pub fn monday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 3, 12, 0, 0).unwrap()
}

pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, 4).unwrap()
}

pub fn saturday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, 8).unwrap()
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(hour, minute, 0).unwrap())
}

pub fn practice() -> Practice {
    Practice {
        id: "1".to_string(),
        name: "Bonafide Care".to_string(),
    }
}

pub fn location() -> ServiceLocation {
    ServiceLocation {
        id: "loc-1".to_string(),
        practice_id: "1".to_string(),
        name: "Main Clinic".to_string(),
        address: "1 Main St".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip_code: "62701".to_string(),
    }
}

pub fn provider(id: &str, full_name: &str) -> Provider {
    let mut parts = full_name.splitn(2, ' ');
    Provider {
        id: id.to_string(),
        practice_id: "1".to_string(),
        first_name: parts.next().unwrap_or_default().to_string(),
        last_name: parts.next().unwrap_or_default().to_string(),
        full_name: full_name.to_string(),
        degree: None,
        npi: None,
        specialty: None,
    }
}

pub fn reason(id: &str, name: &str, duration_minutes: i64) -> AppointmentReason {
    AppointmentReason {
        id: id.to_string(),
        name: name.to_string(),
        duration_minutes,
        practice_id: "1".to_string(),
    }
}

pub fn appointment(
    id: &str,
    provider_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: AppointmentStatus,
) -> Appointment {
    Appointment {
        id: id.to_string(),
        patient_id: "p-0".to_string(),
        provider_id: provider_id.to_string(),
        practice_id: "1".to_string(),
        service_location_id: "loc-1".to_string(),
        appointment_reason_id: "r-1".to_string(),
        start_time: start,
        end_time: end,
        status,
        notes: None,
    }
}

/// Reference data for one practice with a single provider and two reasons.
pub fn with_reference_data(mock: &mut MockPracticeApi) {
    mock.expect_get_practices()
        .returning(|| Ok(vec![practice()]));
    mock.expect_get_service_locations()
        .returning(|_| Ok(vec![location()]));
    mock.expect_get_providers()
        .returning(|_| Ok(vec![provider("prov-1", "Ada Nguyen")]));
    mock.expect_get_appointment_reasons()
        .returning(|_| Ok(vec![reason("r-1", "New patient visit", 30), reason("r-2", "Extended consult", 45)]));
}

pub fn booking_service(mock: MockPracticeApi, clock: Arc<ManualClock>) -> BookingService {
    let config = TestConfig::default().to_app_config();
    BookingService::from_config(&config, Arc::new(mock), clock)
}

pub fn booking_request(start_time: DateTime<Utc>) -> BookingRequest {
    BookingRequest {
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        date_of_birth: "1990-05-05".to_string(),
        email: "jane@example.com".to_string(),
        phone: "5551234567".to_string(),
        appointment_reason_id: "r-1".to_string(),
        start_time,
        notes: None,
        provider_id: None,
    }
}
