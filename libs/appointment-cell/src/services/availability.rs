use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use tracing::debug;

use tebra_cell::{Appointment, Provider};

use crate::models::{AvailableSlot, ClinicHours};

/// Pure slot computation over the clinic's working hours.
#[derive(Debug, Clone)]
pub struct AvailabilityEngine {
    hours: ClinicHours,
}

impl AvailabilityEngine {
    pub fn new(hours: ClinicHours) -> Self {
        Self { hours }
    }

    pub fn hours(&self) -> &ClinicHours {
        &self.hours
    }

    /// Free slots of `duration_minutes` for every provider on `date`, merged
    /// and ordered by start time.
    pub fn compute_slots(
        &self,
        date: NaiveDate,
        duration_minutes: i64,
        existing_appointments: &[Appointment],
        providers: &[Provider],
        now: DateTime<Utc>,
    ) -> Vec<AvailableSlot> {
        let offset = self.hours.utc_offset;
        let today = now.with_timezone(&offset).date_naive();

        if date < today || !self.hours.is_working_day(date.weekday()) {
            return Vec::new();
        }
        if duration_minutes <= 0 || self.hours.slot_minutes <= 0 {
            return Vec::new();
        }

        let Some((open, close)) = self.working_window(date) else {
            return Vec::new();
        };

        let duration = Duration::minutes(duration_minutes);
        let step = Duration::minutes(self.hours.slot_minutes);
        let mut slots = Vec::new();

        for provider in providers {
            let blocking: Vec<&Appointment> = existing_appointments
                .iter()
                .filter(|a| a.provider_id == provider.id && a.status.blocks_time())
                .collect();

            let mut start = open;
            while start + duration <= close {
                let end = start + duration;

                if start >= now && !blocking.iter().any(|a| a.overlaps(start, end)) {
                    slots.push(AvailableSlot {
                        start_time: start,
                        end_time: end,
                        provider_id: provider.id.clone(),
                        provider_name: provider.full_name.clone(),
                    });
                }

                start += step;
            }
        }

        slots.sort_by(|a, b| a.start_time.cmp(&b.start_time));

        debug!("Computed {} slots for {}", slots.len(), date);
        slots
    }

    /// Opening and closing instants of `date` at the clinic offset.
    pub fn working_window(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let midnight = self
            .hours
            .utc_offset
            .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
            .single()?
            .with_timezone(&Utc);

        Some((
            midnight + Duration::hours(i64::from(self.hours.open_hour)),
            midnight + Duration::hours(i64::from(self.hours.close_hour)),
        ))
    }

    /// Working days in `[start, start + days)`.
    pub fn available_dates(&self, start: NaiveDate, days: u32) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take(days as usize)
            .filter(|date| self.hours.is_working_day(date.weekday()))
            .collect()
    }
}

/// e.g. `9:00 AM`
pub fn format_slot_time(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant.with_timezone(&offset).format("%-I:%M %p").to_string()
}

/// e.g. `Tuesday, June 4, 2030`
pub fn format_slot_date(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant.with_timezone(&offset).format("%A, %B %-d, %Y").to_string()
}

/// e.g. `Tuesday, June 4, 2030 at 2:00 PM`
pub fn format_confirmation_datetime(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant
        .with_timezone(&offset)
        .format("%A, %B %-d, %Y at %-I:%M %p")
        .to_string()
}
