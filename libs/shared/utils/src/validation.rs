use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
});

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"));

pub const MAX_EMAIL_LENGTH: usize = 254;

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH && EMAIL_RE.is_match(email)
}

/// Strict `YYYY-MM-DD` shape; calendar validity is checked by the caller.
pub fn is_iso_date(value: &str) -> bool {
    ISO_DATE_RE.is_match(value)
}

/// Field name to messages, in the shape returned to API clients.
#[derive(Debug, Default)]
pub struct FieldValidator {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Character-count bounds on a trimmed value.
    pub fn check_length(&mut self, field: &str, value: &str, min: usize, max: usize, label: &str) {
        let length = value.chars().count();
        if length < min {
            if min <= 1 {
                self.add(field, format!("{} is required", label));
            } else {
                self.add(field, format!("{} must be at least {} characters", label, min));
            }
        } else if length > max {
            self.add(field, format!("{} must be at most {} characters", label, max));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> BTreeMap<String, Vec<String>> {
        self.errors
    }

    pub fn into_result<T>(self, value: T) -> Result<T, BTreeMap<String, Vec<String>>> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }
}
