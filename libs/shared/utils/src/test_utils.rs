use shared_config::AppConfig;

pub struct TestConfig {
    pub tebra_endpoint: String,
    pub customer_key: String,
    pub username: String,
    pub password: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            tebra_endpoint: "http://localhost:54321/KareoServices.svc".to_string(),
            customer_key: "test-customer-key".to_string(),
            username: "test-user@example.com".to_string(),
            password: "test-password".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            tebra_endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Clinic open 09:00-17:00 UTC, Monday to Friday, 30 minute slots.
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            tebra_customer_key: self.customer_key.clone(),
            tebra_username: self.username.clone(),
            tebra_password: self.password.clone(),
            tebra_endpoint: self.tebra_endpoint.clone(),
            tebra_timeout_secs: 5,
            clinic_open_hour: 9,
            clinic_close_hour: 17,
            clinic_slot_minutes: 30,
            clinic_working_days: vec![1, 2, 3, 4, 5],
            clinic_utc_offset_minutes: 0,
            booking_recheck_slot: true,
            rate_limit_max: 5,
            rate_limit_window_ms: 3_600_000,
            port: 0,
        }
    }

    pub fn unconfigured() -> AppConfig {
        AppConfig {
            tebra_customer_key: String::new(),
            tebra_username: String::new(),
            tebra_password: String::new(),
            ..Self::default().to_app_config()
        }
    }
}

/// Canned SOAP envelopes shaped like the Kareo service responses.
pub struct MockTebraResponses;

impl MockTebraResponses {
    pub fn envelope(action: &str, result_inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <{action}Response xmlns="http://www.kareo.com/api/schemas/">
      <{action}Result>
        <ErrorResponse><IsError>false</IsError></ErrorResponse>
        {result_inner}
      </{action}Result>
    </{action}Response>
  </s:Body>
</s:Envelope>"#
        )
    }

    pub fn practices_response(practices: &[(&str, &str)]) -> String {
        let items: String = practices
            .iter()
            .map(|(id, name)| {
                format!("<Practice><PracticeID>{id}</PracticeID><PracticeName>{name}</PracticeName></Practice>")
            })
            .collect();
        Self::envelope("GetPractices", &format!("<Practices>{items}</Practices>"))
    }

    pub fn service_locations_response(practice_id: &str, locations: &[(&str, &str, &str)]) -> String {
        let items: String = locations
            .iter()
            .map(|(id, name, address)| {
                format!(
                    "<ServiceLocation><ID>{id}</ID><PracticeID>{practice_id}</PracticeID><Name>{name}</Name>\
                     <Address>{address}</Address><City>Springfield</City><State>IL</State><ZipCode>62701</ZipCode></ServiceLocation>"
                )
            })
            .collect();
        Self::envelope(
            "GetServiceLocations",
            &format!("<ServiceLocations>{items}</ServiceLocations>"),
        )
    }

    pub fn providers_response(practice_id: &str, providers: &[(&str, &str, &str)]) -> String {
        let items: String = providers
            .iter()
            .map(|(id, first, last)| {
                format!(
                    "<Provider><ID>{id}</ID><PracticeID>{practice_id}</PracticeID><FirstName>{first}</FirstName>\
                     <LastName>{last}</LastName><Degree>PA-C</Degree></Provider>"
                )
            })
            .collect();
        Self::envelope("GetProviders", &format!("<Providers>{items}</Providers>"))
    }

    pub fn reasons_response(practice_id: &str, reasons: &[(&str, &str, Option<u32>)]) -> String {
        let items: String = reasons
            .iter()
            .map(|(id, name, duration)| {
                let duration = duration
                    .map(|d| format!("<Duration>{d}</Duration>"))
                    .unwrap_or_default();
                format!(
                    "<AppointmentReason><ID>{id}</ID><Name>{name}</Name>{duration}\
                     <PracticeID>{practice_id}</PracticeID></AppointmentReason>"
                )
            })
            .collect();
        Self::envelope(
            "GetAppointmentReasons",
            &format!("<AppointmentReasons>{items}</AppointmentReasons>"),
        )
    }

    /// `(id, provider_id, start, end, status)`
    pub fn appointments_response(appointments: &[(&str, &str, &str, &str, &str)]) -> String {
        let items: String = appointments
            .iter()
            .map(|(id, provider_id, start, end, status)| {
                format!(
                    "<Appointment><AppointmentID>{id}</AppointmentID><PatientID>p-1</PatientID>\
                     <ProviderID>{provider_id}</ProviderID><ServiceLocationID>loc-1</ServiceLocationID>\
                     <AppointmentReasonID>reason-1</AppointmentReasonID><StartTime>{start}</StartTime>\
                     <EndTime>{end}</EndTime><Status>{status}</Status></Appointment>"
                )
            })
            .collect();
        Self::envelope("GetAppointments", &format!("<Appointments>{items}</Appointments>"))
    }

    /// `(id, first, last, dob)`
    pub fn patients_response(patients: &[(&str, &str, &str, &str)]) -> String {
        let items: String = patients
            .iter()
            .map(|(id, first, last, dob)| {
                format!(
                    "<Patient><PatientID>{id}</PatientID><FirstName>{first}</FirstName>\
                     <LastName>{last}</LastName><DOB>{dob}</DOB></Patient>"
                )
            })
            .collect();
        Self::envelope("GetPatients", &format!("<Patients>{items}</Patients>"))
    }

    pub fn create_patient_response(patient_id: Option<&str>, error: Option<&str>) -> String {
        Self::envelope("CreatePatient", &Self::create_result("PatientID", patient_id, error))
    }

    pub fn create_appointment_response(appointment_id: Option<&str>, error: Option<&str>) -> String {
        Self::envelope(
            "CreateAppointment",
            &Self::create_result("AppointmentID", appointment_id, error),
        )
    }

    pub fn error_response(action: &str, message: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <{action}Response xmlns="http://www.kareo.com/api/schemas/">
      <{action}Result>
        <ErrorResponse><IsError>true</IsError><ErrorMessage>{message}</ErrorMessage></ErrorResponse>
      </{action}Result>
    </{action}Response>
  </s:Body>
</s:Envelope>"#
        )
    }

    pub fn soap_fault(message: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <s:Fault><faultcode>s:Client</faultcode><faultstring>{message}</faultstring></s:Fault>
  </s:Body>
</s:Envelope>"#
        )
    }

    fn create_result(id_field: &str, id: Option<&str>, error: Option<&str>) -> String {
        let id = id
            .map(|id| format!("<{id_field}>{id}</{id_field}>"))
            .unwrap_or_default();
        let error = error
            .map(|message| format!("<ErrorMessage>{message}</ErrorMessage>"))
            .unwrap_or_default();
        format!("{id}{error}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let app_config = TestConfig::default().to_app_config();

        assert!(app_config.is_configured());
        assert_eq!(app_config.clinic_open_hour, 9);
        assert_eq!(app_config.clinic_close_hour, 17);
        assert!(!TestConfig::unconfigured().is_configured());
    }

    #[test]
    fn test_envelope_wraps_result() {
        let xml = MockTebraResponses::practices_response(&[("1", "Bonafide Care")]);
        assert!(xml.contains("<GetPracticesResponse"));
        assert!(xml.contains("<PracticeID>1</PracticeID>"));
    }
}
