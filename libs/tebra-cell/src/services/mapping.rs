use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

use crate::error::TebraError;
use crate::models::*;
use crate::services::envelope::XmlNode;

pub const DEFAULT_REASON_DURATION_MINUTES: i64 = 30;

/// Rejects results whose in-band error block reports a failure.
pub fn ensure_success(result: &XmlNode) -> Result<(), TebraError> {
    if let Some(security) = result.child("SecurityResponse") {
        if security
            .field("SecurityResultSuccess")
            .is_some_and(|v| v.eq_ignore_ascii_case("false"))
        {
            let message = security
                .field("SecurityResult")
                .unwrap_or("Authentication failed");
            return Err(TebraError::Fault(message.to_string()));
        }
    }

    if let Some(message) = reported_error(result) {
        return Err(TebraError::Fault(message));
    }

    Ok(())
}

fn reported_error(result: &XmlNode) -> Option<String> {
    let error = result.child("ErrorResponse")?;
    let is_error = error
        .field("IsError")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    if !is_error {
        return None;
    }
    Some(
        error
            .field("ErrorMessage")
            .unwrap_or("Remote service reported an error")
            .to_string(),
    )
}

/// Element children of a collection wrapper; a missing wrapper is an empty list.
fn items<'a>(result: Option<&'a XmlNode>, collection: &str) -> &'a [XmlNode] {
    result
        .and_then(|r| r.child(collection))
        .map(|c| c.children.as_slice())
        .unwrap_or(&[])
}

fn text(node: &XmlNode, names: &[&str]) -> String {
    node.first_field(names).unwrap_or_default().to_string()
}

fn optional(node: &XmlNode, names: &[&str]) -> Option<String> {
    node.first_field(names).map(str::to_string)
}

pub fn practices(result: Option<&XmlNode>) -> Vec<Practice> {
    items(result, "Practices")
        .iter()
        .filter_map(|node| {
            let id = node.first_field(&["PracticeID", "ID"])?;
            Some(Practice {
                id: id.to_string(),
                name: text(node, &["PracticeName", "Name"]),
            })
        })
        .collect()
}

pub fn service_locations(result: Option<&XmlNode>, practice_id: &str) -> Vec<ServiceLocation> {
    items(result, "ServiceLocations")
        .iter()
        .filter_map(|node| {
            let id = node.first_field(&["ID", "ServiceLocationID"])?;
            Some(ServiceLocation {
                id: id.to_string(),
                practice_id: node
                    .field("PracticeID")
                    .unwrap_or(practice_id)
                    .to_string(),
                name: text(node, &["Name", "ServiceLocationName"]),
                address: text(node, &["Address", "AddressLine1"]),
                city: text(node, &["City"]),
                state: text(node, &["State"]),
                zip_code: text(node, &["ZipCode"]),
            })
        })
        .collect()
}

pub fn providers(result: Option<&XmlNode>, practice_id: &str) -> Vec<Provider> {
    items(result, "Providers")
        .iter()
        .filter_map(|node| {
            let id = node.first_field(&["ID", "ProviderID"])?;
            let first_name = text(node, &["FirstName"]);
            let last_name = text(node, &["LastName"]);
            let full_name = node
                .field("FullName")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} {}", first_name, last_name).trim().to_string());

            Some(Provider {
                id: id.to_string(),
                practice_id: node
                    .field("PracticeID")
                    .unwrap_or(practice_id)
                    .to_string(),
                first_name,
                last_name,
                full_name,
                degree: optional(node, &["Degree"]),
                npi: optional(node, &["NationalProviderIdentifier", "NPI"]),
                specialty: optional(node, &["SpecialtyName", "Specialty"]),
            })
        })
        .collect()
}

pub fn appointment_reasons(result: Option<&XmlNode>, practice_id: &str) -> Vec<AppointmentReason> {
    items(result, "AppointmentReasons")
        .iter()
        .filter_map(|node| {
            let id = node.first_field(&["ID", "AppointmentReasonID"])?;
            Some(AppointmentReason {
                id: id.to_string(),
                name: text(node, &["Name", "AppointmentReasonName"]),
                duration_minutes: parse_duration(node.first_field(&["Duration", "DefaultDurationMinutes"])),
                practice_id: node
                    .field("PracticeID")
                    .unwrap_or(practice_id)
                    .to_string(),
            })
        })
        .collect()
}

fn parse_duration(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.parse::<i64>().ok())
        .filter(|minutes| *minutes > 0)
        .unwrap_or(DEFAULT_REASON_DURATION_MINUTES)
}

pub fn appointments(result: Option<&XmlNode>, practice_id: &str, offset: FixedOffset) -> Vec<Appointment> {
    items(result, "Appointments")
        .iter()
        .filter_map(|node| {
            let id = node.first_field(&["AppointmentID", "ID"])?;
            let start = node.field("StartTime").and_then(|v| parse_instant(v, offset));
            let end = node.field("EndTime").and_then(|v| parse_instant(v, offset));

            let (start_time, end_time) = match (start, end) {
                (Some(start), Some(end)) => (start, end),
                _ => {
                    warn!("Dropping appointment {} with unreadable start/end time", id);
                    return None;
                }
            };

            Some(Appointment {
                id: id.to_string(),
                patient_id: text(node, &["PatientID"]),
                provider_id: text(node, &["ProviderID", "ResourceID"]),
                practice_id: node
                    .field("PracticeID")
                    .unwrap_or(practice_id)
                    .to_string(),
                service_location_id: text(node, &["ServiceLocationID"]),
                appointment_reason_id: text(node, &["AppointmentReasonID"]),
                start_time,
                end_time,
                status: node
                    .first_field(&["Status", "ConfirmationStatus"])
                    .map(AppointmentStatus::parse_lenient)
                    .unwrap_or(AppointmentStatus::Scheduled),
                notes: optional(node, &["Notes"]),
            })
        })
        .collect()
}

/// RFC 3339 instants are taken as-is; naive timestamps are clinic-local.
pub fn parse_instant(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %I:%M:%S %p"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
}

/// Accepts `YYYY-MM-DD` or `M/D/YYYY`, optionally followed by a time component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date = raw.trim().split(|c: char| c == 'T' || c.is_whitespace()).next()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date, "%m/%d/%Y"))
        .ok()
}

fn same_name(stored: &str, searched: &str) -> bool {
    stored.trim().to_lowercase() == searched.trim().to_lowercase()
}

/// First record matching the search names case-insensitively. A record that
/// carries a date of birth must also match on it.
pub fn matching_patient(result: Option<&XmlNode>, search: &PatientSearch) -> Option<Patient> {
    items(result, "Patients").iter().find_map(|node| {
        let id = node.first_field(&["PatientID", "ID"])?;
        let first_name = text(node, &["FirstName"]);
        let last_name = text(node, &["LastName"]);

        if !same_name(&first_name, &search.first_name) || !same_name(&last_name, &search.last_name) {
            return None;
        }

        let date_of_birth = node.first_field(&["DOB", "DateOfBirth"]).and_then(parse_date);
        if date_of_birth.is_some_and(|dob| dob != search.date_of_birth) {
            return None;
        }

        Some(Patient {
            id: id.to_string(),
            first_name,
            last_name,
            date_of_birth: date_of_birth.unwrap_or(search.date_of_birth),
            email: optional(node, &["EmailAddress", "Email"]),
            phone: optional(node, &["MobilePhone", "HomePhone", "Phone"]),
            practice_id: node
                .field("PracticeID")
                .unwrap_or(&search.practice_id)
                .to_string(),
        })
    })
}

/// Reads the created id or the rejection message. A result whose error block is
/// set never yields an id.
pub fn create_record(result: Option<&XmlNode>, id_field: &str) -> CreateRecordResponse {
    let Some(result) = result else {
        return CreateRecordResponse {
            id: None,
            error_message: Some("Empty response from remote service".to_string()),
        };
    };

    if let Some(message) = reported_error(result) {
        return CreateRecordResponse {
            id: None,
            error_message: Some(message),
        };
    }

    let id = result
        .field(id_field)
        .or_else(|| {
            // Some deployments nest the created record, e.g. Patient/PatientID.
            result
                .children
                .iter()
                .find_map(|child| child.field(id_field))
        })
        .map(str::to_string);

    CreateRecordResponse {
        id,
        error_message: result.field("ErrorMessage").map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::envelope::unwrap_result;
    use chrono::{Duration, Timelike};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_reasons_default_duration() {
        let xml = r#"<Envelope><Body><GetAppointmentReasonsResponse><GetAppointmentReasonsResult>
            <AppointmentReasons>
              <AppointmentReason><ID>r1</ID><Name>Consult</Name><Duration>45</Duration></AppointmentReason>
              <AppointmentReason><ID>r2</ID><Name>Follow up</Name></AppointmentReason>
              <AppointmentReason><ID>r3</ID><Name>Odd</Name><Duration>-5</Duration></AppointmentReason>
            </AppointmentReasons>
            </GetAppointmentReasonsResult></GetAppointmentReasonsResponse></Body></Envelope>"#;

        let result = unwrap_result(xml, "GetAppointmentReasons").unwrap();
        let reasons = appointment_reasons(result.as_ref(), "1");

        assert_eq!(reasons.len(), 3);
        assert_eq!(reasons[0].duration_minutes, 45);
        assert_eq!(reasons[1].duration_minutes, 30);
        assert_eq!(reasons[2].duration_minutes, 30);
        assert_eq!(reasons[1].practice_id, "1");
    }

    #[test]
    fn test_missing_collection_is_empty() {
        assert!(practices(None).is_empty());
        let node = XmlNode::default();
        assert!(providers(Some(&node), "1").is_empty());
    }

    #[test]
    fn test_parse_instant_variants() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();

        let explicit = parse_instant("2030-06-04T14:00:00Z", offset).unwrap();
        assert_eq!(explicit.hour(), 14);

        let local = parse_instant("2030-06-04T09:00:00", offset).unwrap();
        assert_eq!(local.hour(), 14);

        let us_style = parse_instant("06/04/2030 09:30:00 AM", offset).unwrap();
        assert_eq!(us_style - local, Duration::minutes(30));

        assert!(parse_instant("soon", offset).is_none());
    }

    #[test]
    fn test_unreadable_appointments_are_dropped() {
        let xml = r#"<Envelope><Body><GetAppointmentsResponse><GetAppointmentsResult>
            <Appointments>
              <Appointment><AppointmentID>a1</AppointmentID><StartTime>2030-06-04T14:00:00Z</StartTime>
                <EndTime>2030-06-04T14:30:00Z</EndTime><Status>Canceled</Status></Appointment>
              <Appointment><AppointmentID>a2</AppointmentID><StartTime>tbd</StartTime></Appointment>
            </Appointments>
            </GetAppointmentsResult></GetAppointmentsResponse></Body></Envelope>"#;

        let result = unwrap_result(xml, "GetAppointments").unwrap();
        let list = appointments(result.as_ref(), "1", utc());

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].status, AppointmentStatus::Cancelled);
    }

    #[test]
    fn test_matching_patient_checks_dob() {
        let xml = r#"<Envelope><Body><GetPatientsResponse><GetPatientsResult><Patients>
              <Patient><PatientID>p1</PatientID><FirstName>JANE</FirstName><LastName>doe</LastName><DOB>1980-01-02T00:00:00</DOB></Patient>
              <Patient><PatientID>p2</PatientID><FirstName>Jane</FirstName><LastName>Doe</LastName><DOB>1990-05-05</DOB></Patient>
            </Patients></GetPatientsResult></GetPatientsResponse></Body></Envelope>"#;
        let result = unwrap_result(xml, "GetPatients").unwrap();

        let search = PatientSearch {
            practice_id: "1".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 5).unwrap(),
        };
        assert_eq!(matching_patient(result.as_ref(), &search).unwrap().id, "p2");

        let nobody = PatientSearch {
            date_of_birth: NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
            ..search
        };
        assert!(matching_patient(result.as_ref(), &nobody).is_none());
    }

    #[test]
    fn test_matching_patient_folds_non_ascii_case() {
        let xml = r#"<Envelope><Body><GetPatientsResponse><GetPatientsResult><Patients>
              <Patient><PatientID>p3</PatientID><FirstName>ZOË</FirstName><LastName>ÅBERG</LastName><DOB>1985-03-09</DOB></Patient>
            </Patients></GetPatientsResult></GetPatientsResponse></Body></Envelope>"#;
        let result = unwrap_result(xml, "GetPatients").unwrap();

        let search = PatientSearch {
            practice_id: "1".into(),
            first_name: "Zoë".into(),
            last_name: "Åberg".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 9).unwrap(),
        };
        assert_eq!(matching_patient(result.as_ref(), &search).unwrap().id, "p3");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(1980, 1, 2);
        assert_eq!(parse_date("1980-01-02"), expected);
        assert_eq!(parse_date("1980-01-02T00:00:00"), expected);
        assert_eq!(parse_date("01/02/1980 12:00:00 AM"), expected);
        assert_eq!(parse_date("1/2/1980"), expected);
        assert_eq!(parse_date("1/2/1980 12:00:00 AM"), expected);
        assert_eq!(parse_date("unknown"), None);
    }

    #[test]
    fn test_create_record_reads_error_block() {
        let rejected = XmlNode {
            name: "CreatePatientResult".into(),
            text: String::new(),
            children: vec![XmlNode {
                name: "ErrorResponse".into(),
                text: String::new(),
                children: vec![
                    XmlNode { name: "IsError".into(), text: "true".into(), children: vec![] },
                    XmlNode { name: "ErrorMessage".into(), text: "Duplicate".into(), children: vec![] },
                ],
            }],
        };
        let response = create_record(Some(&rejected), "PatientID");
        assert_eq!(response.created_id(), None);
        assert_eq!(response.error_message.as_deref(), Some("Duplicate"));
        assert_matches::assert_matches!(ensure_success(&rejected), Err(TebraError::Fault(_)));
    }
}
