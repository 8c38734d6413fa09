// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, FixedOffset, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_config::AppConfig;
use tebra_cell::{AppointmentReason, Practice, Provider, ServiceLocation, TebraError};

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub provider_id: String,
    pub provider_name: String,
}

/// Working hours of the clinic, expressed at its fixed UTC offset.
#[derive(Debug, Clone)]
pub struct ClinicHours {
    pub open_hour: u32,
    pub close_hour: u32,
    pub slot_minutes: i64,
    pub working_days: Vec<Weekday>,
    pub utc_offset: FixedOffset,
}

impl ClinicHours {
    pub fn from_config(config: &AppConfig) -> Self {
        let working_days = config
            .clinic_working_days
            .iter()
            .filter_map(|day| weekday_from_sunday(*day))
            .collect();

        Self {
            open_hour: config.clinic_open_hour,
            close_hour: config.clinic_close_hour,
            slot_minutes: i64::from(config.clinic_slot_minutes),
            working_days,
            utc_offset: FixedOffset::east_opt(config.clinic_utc_offset_minutes * 60)
                .unwrap_or_else(|| Utc.fix()),
        }
    }

    pub fn is_working_day(&self, weekday: Weekday) -> bool {
        self.working_days.contains(&weekday)
    }
}

impl Default for ClinicHours {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// 0 = Sunday through 6 = Saturday.
fn weekday_from_sunday(day: u32) -> Option<Weekday> {
    match day {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

// ==============================================================================
// BOOTSTRAP SNAPSHOT
// ==============================================================================

/// Reference data for the primary practice, replaced wholesale on refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapSnapshot {
    pub practices: Vec<Practice>,
    pub service_locations: Vec<ServiceLocation>,
    pub providers: Vec<Provider>,
    pub appointment_reasons: Vec<AppointmentReason>,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub is_cached: bool,
    pub cached_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub time_remaining: chrono::Duration,
}

// ==============================================================================
// BOOKING MODELS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    pub email: String,
    pub phone: String,
    pub appointment_reason_id: String,
    pub start_time: DateTime<Utc>,
    pub notes: Option<String>,
    /// Provider of the chosen slot. `None` books the practice's first provider.
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub patient_name: String,
    pub provider_name: String,
    pub service_name: String,
    pub date_time: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResult {
    pub appointment_id: String,
    pub patient_id: String,
    pub patient_created: bool,
    pub confirmation: BookingConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStage {
    Validating,
    ResolvingReference,
    ResolvingPatient,
    CreatingAppointment,
    Succeeded,
}

impl fmt::Display for BookingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStage::Validating => write!(f, "validating"),
            BookingStage::ResolvingReference => write!(f, "resolving reference data"),
            BookingStage::ResolvingPatient => write!(f, "resolving patient"),
            BookingStage::CreatingAppointment => write!(f, "creating appointment"),
            BookingStage::Succeeded => write!(f, "succeeded"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Online booking is not configured")]
    NotConfigured,

    #[error("Clinic configuration unavailable: {0}")]
    Configuration(String),

    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("Unknown appointment reason: {0}")]
    InvalidReason(String),

    #[error("{0}")]
    PatientCreation(String),

    #[error("{0}")]
    AppointmentCreation(String),

    #[error("The selected time is no longer available")]
    SlotNoLongerAvailable,

    #[error("Remote service error while {stage}: {source}")]
    Remote {
        stage: BookingStage,
        #[source]
        source: TebraError,
    },
}

impl BookingError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        BookingError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Adapter for `map_err` that records where the remote call failed.
    pub fn remote(stage: BookingStage) -> impl FnOnce(TebraError) -> BookingError {
        move |source| BookingError::Remote { stage, source }
    }

    /// Stage at which an attempt failing with this error stopped.
    pub fn stage(&self) -> BookingStage {
        match self {
            BookingError::NotConfigured | BookingError::Validation { .. } => BookingStage::Validating,
            BookingError::Configuration(_) | BookingError::InvalidReason(_) => {
                BookingStage::ResolvingReference
            }
            BookingError::PatientCreation(_) => BookingStage::ResolvingPatient,
            BookingError::AppointmentCreation(_) | BookingError::SlotNoLongerAvailable => {
                BookingStage::CreatingAppointment
            }
            BookingError::Remote { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clinic_hours_from_config() {
        let config = AppConfig {
            clinic_working_days: vec![0, 6],
            clinic_utc_offset_minutes: -300,
            ..AppConfig::default()
        };
        let hours = ClinicHours::from_config(&config);

        assert!(hours.is_working_day(Weekday::Sun));
        assert!(hours.is_working_day(Weekday::Sat));
        assert!(!hours.is_working_day(Weekday::Mon));
        assert_eq!(hours.utc_offset.local_minus_utc(), -300 * 60);
    }

    #[test]
    fn test_error_stage() {
        assert_eq!(
            BookingError::validation("email", "Invalid email").stage(),
            BookingStage::Validating
        );
        assert_eq!(
            BookingError::InvalidReason("r-9".into()).stage(),
            BookingStage::ResolvingReference
        );
        assert_eq!(
            BookingError::PatientCreation("rejected".into()).stage(),
            BookingStage::ResolvingPatient
        );
        let remote = BookingError::remote(BookingStage::CreatingAppointment)(TebraError::NotConfigured);
        assert_eq!(remote.stage(), BookingStage::CreatingAppointment);
    }
}
