use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared_config::AppConfig;

// ==============================================================================
// CREDENTIALS
// ==============================================================================

#[derive(Clone)]
pub struct TebraCredentials {
    pub customer_key: String,
    pub username: String,
    pub password: String,
}

impl TebraCredentials {
    /// `None` unless all three values are present.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(Self {
            customer_key: config.tebra_customer_key.clone(),
            username: config.tebra_username.clone(),
            password: config.tebra_password.clone(),
        })
    }
}

impl fmt::Debug for TebraCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TebraCredentials")
            .field("customer_key", &"***")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// ==============================================================================
// REFERENCE DATA
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Practice {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLocation {
    pub id: String,
    pub practice_id: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub practice_id: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub degree: Option<String>,
    pub npi: Option<String>,
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentReason {
    pub id: String,
    pub name: String,
    /// Authoritative length of the visit.
    pub duration_minutes: i64,
    pub practice_id: String,
}

// ==============================================================================
// PATIENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub practice_id: String,
}

#[derive(Debug, Clone)]
pub struct PatientSearch {
    pub practice_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct CreatePatientRequest {
    pub practice_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub email: Option<String>,
    pub phone: Option<String>,
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    /// Lenient parse of the remote status string; unknown values block time like
    /// a scheduled visit.
    pub fn parse_lenient(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "confirmed" => AppointmentStatus::Confirmed,
            "cancelled" | "canceled" => AppointmentStatus::Cancelled,
            "completed" | "checkedout" => AppointmentStatus::Completed,
            "noshow" => AppointmentStatus::NoShow,
            _ => AppointmentStatus::Scheduled,
        }
    }

    pub fn blocks_time(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "Scheduled"),
            AppointmentStatus::Confirmed => write!(f, "Confirmed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::NoShow => write!(f, "NoShow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub provider_id: String,
    pub practice_id: String,
    pub service_location_id: String,
    pub appointment_reason_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl Appointment {
    /// Half-open interval overlap against `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end_time && self.start_time < end
    }
}

#[derive(Debug, Clone)]
pub struct GetAppointmentsRequest {
    pub practice_id: String,
    pub provider_id: Option<String>,
    pub service_location_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct CreateAppointmentRequest {
    pub practice_id: String,
    pub service_location_id: String,
    pub provider_id: String,
    pub patient_id: String,
    pub appointment_reason_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub is_recurring: bool,
    pub was_created_online: bool,
    pub notes: Option<String>,
}

/// Outcome of a remote create call. The service reports rejection in-band, so a
/// successful HTTP exchange may still carry no id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRecordResponse {
    pub id: Option<String>,
    pub error_message: Option<String>,
}

impl CreateRecordResponse {
    pub fn created_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_parse_lenient() {
        assert_eq!(AppointmentStatus::parse_lenient("Canceled"), AppointmentStatus::Cancelled);
        assert_eq!(AppointmentStatus::parse_lenient("CANCELLED"), AppointmentStatus::Cancelled);
        assert_eq!(AppointmentStatus::parse_lenient("No Show"), AppointmentStatus::NoShow);
        assert_eq!(AppointmentStatus::parse_lenient("Rescheduled"), AppointmentStatus::Scheduled);
        assert!(!AppointmentStatus::Cancelled.blocks_time());
        assert!(AppointmentStatus::Confirmed.blocks_time());
    }

    #[test]
    fn test_overlap_is_half_open() {
        let at = |h, m| Utc.with_ymd_and_hms(2030, 6, 4, h, m, 0).unwrap();
        let appointment = Appointment {
            id: "a".into(),
            patient_id: "p".into(),
            provider_id: "prov".into(),
            practice_id: "1".into(),
            service_location_id: "loc".into(),
            appointment_reason_id: "r".into(),
            start_time: at(14, 0),
            end_time: at(14, 30),
            status: AppointmentStatus::Scheduled,
            notes: None,
        };

        assert!(appointment.overlaps(at(13, 45), at(14, 15)));
        assert!(!appointment.overlaps(at(13, 30), at(14, 0)));
        assert!(!appointment.overlaps(at(14, 30), at(15, 0)));
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = TebraCredentials {
            customer_key: "secret-key".into(),
            username: "user".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("secret-key"));
    }
}
