use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_TEBRA_ENDPOINT: &str =
    "https://webservice.kareo.com/services/soap/2.1/KareoServices.svc";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tebra_customer_key: String,
    pub tebra_username: String,
    pub tebra_password: String,
    pub tebra_endpoint: String,
    pub tebra_timeout_secs: u64,
    pub clinic_open_hour: u32,
    pub clinic_close_hour: u32,
    pub clinic_slot_minutes: u32,
    /// Weekday numbers, 0 = Sunday.
    pub clinic_working_days: Vec<u32>,
    pub clinic_utc_offset_minutes: i32,
    pub booking_recheck_slot: bool,
    pub rate_limit_max: u32,
    pub rate_limit_window_ms: u64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tebra_customer_key: String::new(),
            tebra_username: String::new(),
            tebra_password: String::new(),
            tebra_endpoint: DEFAULT_TEBRA_ENDPOINT.to_string(),
            tebra_timeout_secs: 30,
            clinic_open_hour: 10,
            clinic_close_hour: 18,
            clinic_slot_minutes: 30,
            clinic_working_days: vec![1, 2, 3, 4, 5],
            clinic_utc_offset_minutes: 0,
            booking_recheck_slot: true,
            rate_limit_max: 5,
            rate_limit_window_ms: 3_600_000,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut config = Self {
            tebra_customer_key: env::var("TEBRA_CUSTOMER_KEY")
                .unwrap_or_else(|_| {
                    warn!("TEBRA_CUSTOMER_KEY not set, using empty value");
                    String::new()
                }),
            tebra_username: env::var("TEBRA_USERNAME")
                .unwrap_or_else(|_| {
                    warn!("TEBRA_USERNAME not set, using empty value");
                    String::new()
                }),
            tebra_password: env::var("TEBRA_PASSWORD")
                .unwrap_or_else(|_| {
                    warn!("TEBRA_PASSWORD not set, using empty value");
                    String::new()
                }),
            tebra_endpoint: env::var("TEBRA_ENDPOINT")
                .unwrap_or(defaults.tebra_endpoint),
            tebra_timeout_secs: env_parse("TEBRA_TIMEOUT_SECS", defaults.tebra_timeout_secs),
            clinic_open_hour: env_parse("CLINIC_OPEN_HOUR", defaults.clinic_open_hour),
            clinic_close_hour: env_parse("CLINIC_CLOSE_HOUR", defaults.clinic_close_hour),
            clinic_slot_minutes: env_parse("CLINIC_SLOT_MINUTES", defaults.clinic_slot_minutes),
            clinic_working_days: env::var("CLINIC_WORKING_DAYS")
                .ok()
                .and_then(|raw| parse_working_days(&raw))
                .unwrap_or(defaults.clinic_working_days),
            clinic_utc_offset_minutes: env_parse(
                "CLINIC_UTC_OFFSET_MINUTES",
                defaults.clinic_utc_offset_minutes,
            ),
            booking_recheck_slot: env_parse("BOOKING_RECHECK_SLOT", defaults.booking_recheck_slot),
            rate_limit_max: env_parse("RATE_LIMIT_MAX", defaults.rate_limit_max),
            rate_limit_window_ms: env_parse("RATE_LIMIT_WINDOW_MS", defaults.rate_limit_window_ms),
            port: env_parse("PORT", defaults.port),
        };

        config.sanitize_clinic_hours();

        if !config.is_configured() {
            warn!("Tebra integration not configured - booking endpoints will return 503");
        }

        config
    }

    /// True when all three Tebra credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.tebra_customer_key.is_empty()
            && !self.tebra_username.is_empty()
            && !self.tebra_password.is_empty()
    }

    fn sanitize_clinic_hours(&mut self) {
        let defaults = Self::default();

        if self.clinic_close_hour > 24 || self.clinic_open_hour >= self.clinic_close_hour {
            warn!(
                "Invalid clinic hours {}-{}, using {}-{}",
                self.clinic_open_hour,
                self.clinic_close_hour,
                defaults.clinic_open_hour,
                defaults.clinic_close_hour
            );
            self.clinic_open_hour = defaults.clinic_open_hour;
            self.clinic_close_hour = defaults.clinic_close_hour;
        }

        if self.clinic_slot_minutes == 0 {
            warn!("CLINIC_SLOT_MINUTES must be positive, using {}", defaults.clinic_slot_minutes);
            self.clinic_slot_minutes = defaults.clinic_slot_minutes;
        }

        // +/- 18h is the chrono FixedOffset range
        if self.clinic_utc_offset_minutes.abs() >= 18 * 60 {
            warn!("CLINIC_UTC_OFFSET_MINUTES out of range, using UTC");
            self.clinic_utc_offset_minutes = 0;
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value, using default", key);
            default
        }),
        Err(_) => default,
    }
}

/// Parses a comma separated weekday list such as `1,2,3,4,5`.
pub fn parse_working_days(raw: &str) -> Option<Vec<u32>> {
    let mut days = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<u32>() {
            Ok(day) if day <= 6 => {
                if !days.contains(&day) {
                    days.push(day);
                }
            }
            _ => {
                warn!("CLINIC_WORKING_DAYS contains invalid day '{}', using default", part);
                return None;
            }
        }
    }
    days.sort_unstable();
    Some(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_not_configured() {
        assert!(!AppConfig::default().is_configured());
    }

    #[test]
    fn test_partial_credentials_are_not_configured() {
        let config = AppConfig {
            tebra_customer_key: "key".to_string(),
            tebra_username: "user".to_string(),
            ..AppConfig::default()
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn test_parse_working_days() {
        assert_eq!(parse_working_days("5, 1,3,1"), Some(vec![1, 3, 5]));
        assert_eq!(parse_working_days("1,7"), None);
        assert_eq!(parse_working_days("mon"), None);
    }

    #[test]
    fn test_sanitize_rejects_inverted_hours() {
        let mut config = AppConfig {
            clinic_open_hour: 17,
            clinic_close_hour: 9,
            clinic_slot_minutes: 0,
            ..AppConfig::default()
        };
        config.sanitize_clinic_hours();
        assert_eq!(config.clinic_open_hour, 10);
        assert_eq!(config.clinic_close_hour, 18);
        assert_eq!(config.clinic_slot_minutes, 30);
    }
}
