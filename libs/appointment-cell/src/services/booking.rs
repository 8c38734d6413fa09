// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_utils::Clock;
use tebra_cell::{
    AppointmentStatus, CreateAppointmentRequest, CreatePatientRequest, GetAppointmentsRequest,
    PatientSearch, PracticeApi, Provider, ServiceLocation,
};

use crate::models::{
    AvailableSlot, BookingConfirmation, BookingError, BookingRequest, BookingResult, BookingStage,
    ClinicHours,
};
use crate::services::availability::{format_confirmation_datetime, AvailabilityEngine};
use crate::services::cache::BootstrapCache;

pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_NOTES_LENGTH: usize = 500;
pub const MAX_PHONE_LENGTH: usize = 20;

/// Turns a slot selection into a confirmed appointment and answers
/// availability queries for the primary practice.
pub struct BookingService {
    gateway: Arc<dyn PracticeApi>,
    cache: Arc<BootstrapCache>,
    engine: AvailabilityEngine,
    clock: Arc<dyn Clock>,
    configured: bool,
    recheck_before_create: bool,
}

impl BookingService {
    pub fn new(
        gateway: Arc<dyn PracticeApi>,
        cache: Arc<BootstrapCache>,
        engine: AvailabilityEngine,
        clock: Arc<dyn Clock>,
        configured: bool,
    ) -> Self {
        Self {
            gateway,
            cache,
            engine,
            clock,
            configured,
            recheck_before_create: true,
        }
    }

    pub fn from_config(config: &AppConfig, gateway: Arc<dyn PracticeApi>, clock: Arc<dyn Clock>) -> Self {
        let cache = Arc::new(BootstrapCache::new(Arc::clone(&gateway), Arc::clone(&clock)));
        let engine = AvailabilityEngine::new(ClinicHours::from_config(config));

        Self::new(gateway, cache, engine, clock, config.is_configured())
            .with_recheck(config.booking_recheck_slot)
    }

    pub fn with_recheck(mut self, enabled: bool) -> Self {
        self.recheck_before_create = enabled;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn cache(&self) -> &Arc<BootstrapCache> {
        &self.cache
    }

    pub fn engine(&self) -> &AvailabilityEngine {
        &self.engine
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        self.engine.hours().utc_offset
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ==============================================================================
    // AVAILABILITY
    // ==============================================================================

    #[instrument(skip(self))]
    pub async fn get_available_slots(
        &self,
        date: NaiveDate,
        appointment_reason_id: &str,
    ) -> Result<Vec<AvailableSlot>, BookingError> {
        if !self.configured {
            return Err(BookingError::NotConfigured);
        }

        let reason = self
            .cache
            .reason_by_id(appointment_reason_id)
            .await?
            .ok_or_else(|| BookingError::InvalidReason(appointment_reason_id.to_string()))?;

        let snapshot = self.cache.get_snapshot().await?;
        let practice_id = snapshot
            .practices
            .first()
            .map(|p| p.id.clone())
            .ok_or_else(|| BookingError::Configuration("No practices found".to_string()))?;

        let now = self.clock.now();
        let today = now.with_timezone(&self.clinic_offset()).date_naive();
        if date < today || !self.engine.hours().is_working_day(date.weekday()) {
            debug!("{} is not bookable, skipping appointment lookup", date);
            return Ok(Vec::new());
        }

        let existing = self
            .gateway
            .get_appointments(&GetAppointmentsRequest {
                practice_id,
                provider_id: None,
                service_location_id: None,
                start_date: date,
                end_date: date,
            })
            .await
            .map_err(BookingError::remote(BookingStage::ResolvingReference))?;

        Ok(self.engine.compute_slots(
            date,
            reason.duration_minutes,
            &existing,
            &snapshot.providers,
            now,
        ))
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    /// Runs one booking attempt: validate, resolve reference data, find or
    /// create the patient, then create the appointment. Steps never overlap.
    #[instrument(skip(self, request), fields(attempt_id = %Uuid::new_v4()))]
    pub async fn book_appointment(&self, request: BookingRequest) -> Result<BookingResult, BookingError> {
        if !self.configured {
            return Err(BookingError::NotConfigured);
        }

        let date_of_birth = validate_booking(&request, self.clock.now(), self.clinic_offset())?;

        // Reference data
        let reason = self
            .cache
            .reason_by_id(&request.appointment_reason_id)
            .await?
            .ok_or_else(|| BookingError::InvalidReason(request.appointment_reason_id.clone()))?;
        let practice_id = self.cache.primary_practice_id().await?;
        let location = self.cache.primary_service_location().await?;
        let provider = self.resolve_provider(request.provider_id.as_deref()).await?;

        let start_time = request.start_time;
        let end_time = start_time + Duration::minutes(reason.duration_minutes);

        // Patient
        let (patient_id, patient_created) = self
            .resolve_patient(&request, &practice_id, date_of_birth)
            .await?;

        // Appointment
        if self.recheck_before_create {
            self.ensure_slot_free(&practice_id, &provider.id, start_time, end_time)
                .await?;
        }

        let response = self
            .gateway
            .create_appointment(&CreateAppointmentRequest {
                practice_id,
                service_location_id: location.id.clone(),
                provider_id: provider.id.clone(),
                patient_id: patient_id.clone(),
                appointment_reason_id: reason.id.clone(),
                start_time,
                end_time,
                status: AppointmentStatus::Scheduled,
                is_recurring: false,
                was_created_online: true,
                notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
            })
            .await
            .map_err(BookingError::remote(BookingStage::CreatingAppointment))?;

        let Some(appointment_id) = response.created_id().map(str::to_string) else {
            let message = response
                .error_message
                .unwrap_or_else(|| "Failed to create appointment".to_string());
            warn!("Appointment creation rejected for patient {}", patient_id);
            return Err(BookingError::AppointmentCreation(message));
        };

        info!(
            "Appointment {} booked for patient {} (new patient: {})",
            appointment_id, patient_id, patient_created
        );

        Ok(BookingResult {
            appointment_id,
            patient_id,
            patient_created,
            confirmation: BookingConfirmation {
                patient_name: format!("{} {}", request.first_name.trim(), request.last_name.trim()),
                provider_name: provider_display_name(&provider),
                service_name: reason.name,
                date_time: format_confirmation_datetime(start_time, self.clinic_offset()),
                location: location_display(&location),
            },
        })
    }

    async fn resolve_provider(&self, provider_id: Option<&str>) -> Result<Provider, BookingError> {
        match provider_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => self
                .cache
                .provider_by_id(id)
                .await?
                .ok_or_else(|| BookingError::validation("providerId", "Unknown provider")),
            None => self.cache.primary_provider().await,
        }
    }

    async fn resolve_patient(
        &self,
        request: &BookingRequest,
        practice_id: &str,
        date_of_birth: NaiveDate,
    ) -> Result<(String, bool), BookingError> {
        let existing = self
            .gateway
            .search_patient(&PatientSearch {
                practice_id: practice_id.to_string(),
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                date_of_birth,
            })
            .await
            .map_err(BookingError::remote(BookingStage::ResolvingPatient))?;

        if let Some(patient) = existing {
            debug!("Reusing existing patient {}", patient.id);
            return Ok((patient.id, false));
        }

        let response = self
            .gateway
            .create_patient(&CreatePatientRequest {
                practice_id: practice_id.to_string(),
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                date_of_birth,
                email: Some(request.email.trim().to_string()),
                phone: Some(request.phone.trim().to_string()),
            })
            .await
            .map_err(BookingError::remote(BookingStage::ResolvingPatient))?;

        match response.created_id().map(str::to_string) {
            Some(id) => {
                info!("Created patient {}", id);
                Ok((id, true))
            }
            None => Err(BookingError::PatientCreation(
                response
                    .error_message
                    .unwrap_or_else(|| "Failed to create patient record".to_string()),
            )),
        }
    }

    /// Fails when a non-cancelled appointment of `provider_id` overlaps the slot.
    async fn ensure_slot_free(
        &self,
        practice_id: &str,
        provider_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let offset = self.clinic_offset();
        let existing = self
            .gateway
            .get_appointments(&GetAppointmentsRequest {
                practice_id: practice_id.to_string(),
                provider_id: Some(provider_id.to_string()),
                service_location_id: None,
                start_date: start_time.with_timezone(&offset).date_naive(),
                end_date: end_time.with_timezone(&offset).date_naive(),
            })
            .await
            .map_err(BookingError::remote(BookingStage::CreatingAppointment))?;

        let taken = existing.iter().any(|a| {
            a.provider_id == provider_id && a.status.blocks_time() && a.overlaps(start_time, end_time)
        });

        if taken {
            warn!("Slot {} for provider {} was taken before booking", start_time, provider_id);
            return Err(BookingError::SlotNoLongerAvailable);
        }
        Ok(())
    }
}

/// Checks a request before any remote call. Returns the parsed date of birth.
/// "Today" for the date of birth is the clinic's date at `offset`.
pub fn validate_booking(
    request: &BookingRequest,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<NaiveDate, BookingError> {
    for (field, value) in [("firstName", &request.first_name), ("lastName", &request.last_name)] {
        let length = value.trim().chars().count();
        if length == 0 {
            return Err(BookingError::validation(field, "Name is required"));
        }
        if length > MAX_NAME_LENGTH {
            return Err(BookingError::validation(field, "Name is too long"));
        }
    }

    let date_of_birth = NaiveDate::parse_from_str(request.date_of_birth.trim(), "%Y-%m-%d")
        .map_err(|_| BookingError::validation("dateOfBirth", "Date of birth must be YYYY-MM-DD"))?;
    if date_of_birth > now.with_timezone(&offset).date_naive() {
        return Err(BookingError::validation("dateOfBirth", "Date of birth cannot be in the future"));
    }

    if !request.email.contains('@') {
        return Err(BookingError::validation("email", "Invalid email address"));
    }

    let phone_length = request.phone.trim().chars().count();
    if phone_length == 0 {
        return Err(BookingError::validation("phone", "Phone number is required"));
    }
    if phone_length > MAX_PHONE_LENGTH {
        return Err(BookingError::validation("phone", "Phone number must be at most 20 characters"));
    }

    if request.appointment_reason_id.trim().is_empty() {
        return Err(BookingError::validation("appointmentReasonId", "Appointment type is required"));
    }

    if request.start_time <= now {
        return Err(BookingError::validation("startTime", "Appointment time must be in the future"));
    }

    if request
        .notes
        .as_ref()
        .is_some_and(|notes| notes.chars().count() > MAX_NOTES_LENGTH)
    {
        return Err(BookingError::validation("notes", "Notes must be 500 characters or fewer"));
    }

    Ok(date_of_birth)
}

fn provider_display_name(provider: &Provider) -> String {
    let name = provider.full_name.trim();
    if name.is_empty() {
        "Provider".to_string()
    } else {
        name.to_string()
    }
}

fn location_display(location: &ServiceLocation) -> String {
    match (location.name.trim(), location.address.trim()) {
        ("", _) => "Clinic Location".to_string(),
        (name, "") => name.to_string(),
        (name, address) => format!("{}, {}", name, address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn request(now: DateTime<Utc>) -> BookingRequest {
        BookingRequest {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: "1990-05-05".to_string(),
            email: "jane@example.com".to_string(),
            phone: "5551234567".to_string(),
            appointment_reason_id: "r-1".to_string(),
            start_time: now + Duration::days(1),
            notes: None,
            provider_id: None,
        }
    }

    #[test]
    fn test_validate_accepts_good_request() {
        let now = Utc.with_ymd_and_hms(2030, 6, 3, 12, 0, 0).unwrap();
        assert_eq!(
            validate_booking(&request(now), now, utc()).unwrap(),
            NaiveDate::from_ymd_opt(1990, 5, 5).unwrap()
        );
    }

    #[test]
    fn test_validate_rejects_each_field() {
        let now = Utc.with_ymd_and_hms(2030, 6, 3, 12, 0, 0).unwrap();

        let cases: Vec<(&str, Box<dyn Fn(&mut BookingRequest)>)> = vec![
            ("firstName", Box::new(|r: &mut BookingRequest| r.first_name = "  ".into())),
            ("lastName", Box::new(|r: &mut BookingRequest| r.last_name = "x".repeat(51))),
            ("dateOfBirth", Box::new(|r: &mut BookingRequest| r.date_of_birth = "05/05/1990".into())),
            ("dateOfBirth", Box::new(|r: &mut BookingRequest| r.date_of_birth = "2031-01-01".into())),
            ("email", Box::new(|r: &mut BookingRequest| r.email = "jane.example.com".into())),
            ("phone", Box::new(|r: &mut BookingRequest| r.phone = String::new())),
            ("phone", Box::new(|r: &mut BookingRequest| r.phone = "5".repeat(21))),
            ("appointmentReasonId", Box::new(|r: &mut BookingRequest| r.appointment_reason_id = " ".into())),
            ("startTime", Box::new(move |r: &mut BookingRequest| r.start_time = now)),
            ("notes", Box::new(|r: &mut BookingRequest| r.notes = Some("n".repeat(501)))),
        ];

        for (expected, mutate) in cases {
            let mut req = request(now);
            mutate(&mut req);
            assert_matches!(
                validate_booking(&req, now, utc()),
                Err(BookingError::Validation { field, .. }) if field == expected
            );
        }
    }

    #[test]
    fn test_date_of_birth_is_checked_against_clinic_date() {
        // 03:00 UTC on June 4 is still June 3 in the clinic.
        let now = Utc.with_ymd_and_hms(2030, 6, 4, 3, 0, 0).unwrap();
        let clinic = FixedOffset::west_opt(5 * 3600).unwrap();
        let mut req = request(now);
        req.date_of_birth = "2030-06-04".to_string();

        assert_matches!(
            validate_booking(&req, now, clinic),
            Err(BookingError::Validation { field, .. }) if field == "dateOfBirth"
        );

        req.date_of_birth = "2030-06-03".to_string();
        assert_eq!(
            validate_booking(&req, now, clinic).unwrap(),
            NaiveDate::from_ymd_opt(2030, 6, 3).unwrap()
        );
    }

    #[test]
    fn test_location_display_fallbacks() {
        let mut location = ServiceLocation {
            id: "loc-1".into(),
            practice_id: "1".into(),
            name: "Main Clinic".into(),
            address: "1 Main St".into(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
        };
        assert_eq!(location_display(&location), "Main Clinic, 1 Main St");

        location.address.clear();
        assert_eq!(location_display(&location), "Main Clinic");

        location.name.clear();
        assert_eq!(location_display(&location), "Clinic Location");
    }
}
