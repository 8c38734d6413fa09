use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, Offset, SecondsFormat, Utc};
use reqwest::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use shared_config::AppConfig;

use crate::error::TebraError;
use crate::models::*;
use crate::services::envelope::{build_envelope, unwrap_result, SoapRequest, XmlNode};
use crate::services::mapping;
use crate::services::retry::RetryPolicy;

/// Operations the booking core needs from the practice-management system.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait PracticeApi: Send + Sync {
    async fn get_practices(&self) -> Result<Vec<Practice>, TebraError>;

    async fn get_service_locations(&self, practice_id: &str) -> Result<Vec<ServiceLocation>, TebraError>;

    async fn get_providers(&self, practice_id: &str) -> Result<Vec<Provider>, TebraError>;

    async fn get_appointment_reasons(&self, practice_id: &str) -> Result<Vec<AppointmentReason>, TebraError>;

    /// Best-effort lookup by name and date of birth.
    async fn search_patient(&self, search: &PatientSearch) -> Result<Option<Patient>, TebraError>;

    async fn create_patient(&self, request: &CreatePatientRequest) -> Result<CreateRecordResponse, TebraError>;

    async fn get_appointments(&self, request: &GetAppointmentsRequest) -> Result<Vec<Appointment>, TebraError>;

    async fn create_appointment(
        &self,
        request: &CreateAppointmentRequest,
    ) -> Result<CreateRecordResponse, TebraError>;
}

pub struct TebraClient {
    client: Client,
    endpoint: String,
    credentials: Option<TebraCredentials>,
    clinic_offset: FixedOffset,
    retry: RetryPolicy,
}

impl TebraClient {
    pub fn new(config: &AppConfig) -> Result<Self, TebraError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.tebra_timeout_secs))
            .build()?;

        let clinic_offset = FixedOffset::east_opt(config.clinic_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());

        Ok(Self {
            client,
            endpoint: config.tebra_endpoint.clone(),
            credentials: TebraCredentials::from_config(config),
            clinic_offset,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Sends one request through the retry policy and unwraps its result node.
    async fn call(&self, request: SoapRequest) -> Result<Option<XmlNode>, TebraError> {
        let credentials = self.credentials.as_ref().ok_or(TebraError::NotConfigured)?;
        let body = build_envelope(credentials, &request)?;
        let soap_action = request.soap_action();

        let xml = self
            .retry
            .run(request.action, || self.send(&soap_action, body.clone()))
            .await?;

        unwrap_result(&xml, request.action)
    }

    async fn send(&self, soap_action: &str, body: String) -> Result<String, TebraError> {
        debug!("POST {} ({})", self.endpoint, soap_action);

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", soap_action)
            .body(body)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(parse_retry_after);
            return Err(TebraError::RateLimited { retry_after });
        }

        let text = response.text().await?;

        // SOAP faults arrive as HTTP 500 with a readable envelope.
        if status == StatusCode::INTERNAL_SERVER_ERROR && text.contains("Fault") {
            return Ok(text);
        }

        if !status.is_success() {
            debug!("HTTP {} from remote: {}", status, body_preview(&text));
            return Err(TebraError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    /// Calls a list operation; in-band errors become faults.
    async fn call_checked(&self, request: SoapRequest) -> Result<Option<XmlNode>, TebraError> {
        let result = self.call(request).await?;
        if let Some(node) = &result {
            mapping::ensure_success(node)?;
        }
        Ok(result)
    }
}

const BODY_PREVIEW_CHARS: usize = 200;

fn body_preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Integer seconds only; HTTP-date hints fall back to the computed backoff.
fn parse_retry_after(value: &HeaderValue) -> Option<Duration> {
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn practice_fields(action: &'static str, practice_id: &str) -> SoapRequest {
    SoapRequest::new(action, "Fields").field("PracticeID", practice_id)
}

#[async_trait]
impl PracticeApi for TebraClient {
    #[instrument(skip(self))]
    async fn get_practices(&self) -> Result<Vec<Practice>, TebraError> {
        let result = self
            .call_checked(SoapRequest::new("GetPractices", "Fields").field("Active", "true"))
            .await?;
        Ok(mapping::practices(result.as_ref()))
    }

    #[instrument(skip(self))]
    async fn get_service_locations(&self, practice_id: &str) -> Result<Vec<ServiceLocation>, TebraError> {
        let result = self
            .call_checked(practice_fields("GetServiceLocations", practice_id))
            .await?;
        Ok(mapping::service_locations(result.as_ref(), practice_id))
    }

    #[instrument(skip(self))]
    async fn get_providers(&self, practice_id: &str) -> Result<Vec<Provider>, TebraError> {
        let result = self
            .call_checked(practice_fields("GetProviders", practice_id))
            .await?;
        Ok(mapping::providers(result.as_ref(), practice_id))
    }

    #[instrument(skip(self))]
    async fn get_appointment_reasons(&self, practice_id: &str) -> Result<Vec<AppointmentReason>, TebraError> {
        let result = self
            .call_checked(practice_fields("GetAppointmentReasons", practice_id))
            .await?;
        Ok(mapping::appointment_reasons(result.as_ref(), practice_id))
    }

    #[instrument(skip(self, search), fields(practice_id = %search.practice_id))]
    async fn search_patient(&self, search: &PatientSearch) -> Result<Option<Patient>, TebraError> {
        let request = practice_fields("GetPatients", &search.practice_id)
            .field("FirstName", search.first_name.trim())
            .field("LastName", search.last_name.trim())
            .field("DOB", search.date_of_birth.format("%Y-%m-%d").to_string());

        let result = self.call_checked(request).await?;
        Ok(mapping::matching_patient(result.as_ref(), search))
    }

    #[instrument(skip(self, request), fields(practice_id = %request.practice_id))]
    async fn create_patient(&self, request: &CreatePatientRequest) -> Result<CreateRecordResponse, TebraError> {
        let soap = SoapRequest::new("CreatePatient", "Patient")
            .field("PracticeID", &request.practice_id)
            .field("FirstName", request.first_name.trim())
            .field("LastName", request.last_name.trim())
            .field("DateofBirth", request.date_of_birth.format("%Y-%m-%d").to_string())
            .optional_field("EmailAddress", request.email.as_deref())
            .optional_field("MobilePhone", request.phone.as_deref());

        let result = self.call(soap).await?;
        Ok(mapping::create_record(result.as_ref(), "PatientID"))
    }

    #[instrument(skip(self, request), fields(practice_id = %request.practice_id))]
    async fn get_appointments(&self, request: &GetAppointmentsRequest) -> Result<Vec<Appointment>, TebraError> {
        let soap = practice_fields("GetAppointments", &request.practice_id)
            .field("StartDate", request.start_date.format("%Y-%m-%d").to_string())
            .field("EndDate", request.end_date.format("%Y-%m-%d").to_string())
            .optional_field("ProviderID", request.provider_id.as_deref())
            .optional_field("ServiceLocationID", request.service_location_id.as_deref());

        let result = self.call_checked(soap).await?;
        Ok(mapping::appointments(
            result.as_ref(),
            &request.practice_id,
            self.clinic_offset,
        ))
    }

    #[instrument(skip(self, request), fields(practice_id = %request.practice_id, provider_id = %request.provider_id))]
    async fn create_appointment(
        &self,
        request: &CreateAppointmentRequest,
    ) -> Result<CreateRecordResponse, TebraError> {
        let soap = SoapRequest::new("CreateAppointment", "Appointment")
            .field("PracticeID", &request.practice_id)
            .field("ServiceLocationID", &request.service_location_id)
            .field("ProviderID", &request.provider_id)
            .field("PatientID", &request.patient_id)
            .field("AppointmentReasonID", &request.appointment_reason_id)
            .field(
                "StartTime",
                request.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .field(
                "EndTime",
                request.end_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .field("AppointmentStatus", request.status.to_string())
            .field("IsRecurring", request.is_recurring.to_string())
            .field("WasCreatedOnline", request.was_created_online.to_string())
            .optional_field("Notes", request.notes.as_deref());

        let result = self.call(soap).await?;
        Ok(mapping::create_record(result.as_ref(), "AppointmentID"))
    }
}
