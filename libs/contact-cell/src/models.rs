// libs/contact-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::FieldErrors;
use shared_utils::validation::{is_valid_email, FieldValidator};

pub const MAX_NAME_LENGTH: usize = 100;
pub const MIN_PHONE_LENGTH: usize = 10;
pub const MAX_PHONE_LENGTH: usize = 20;
pub const MIN_MESSAGE_LENGTH: usize = 10;
pub const MAX_MESSAGE_LENGTH: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct ContactPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
}

/// A contact form submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum ContactError {
    #[error("Message delivery failed: {0}")]
    Delivery(String),
}

impl ContactPayload {
    pub fn validate(self) -> Result<ContactMessage, FieldErrors> {
        let mut validator = FieldValidator::new();

        let name = self.name.unwrap_or_default().trim().to_string();
        validator.check_length("name", &name, 1, MAX_NAME_LENGTH, "Name");

        let email = self.email.unwrap_or_default().trim().to_string();
        if !is_valid_email(&email) {
            validator.add("email", "Invalid email address");
        }

        let phone = self.phone.unwrap_or_default().trim().to_string();
        if phone.chars().count() < MIN_PHONE_LENGTH {
            validator.add("phone", "Valid phone number is required");
        } else if phone.chars().count() > MAX_PHONE_LENGTH {
            validator.add("phone", format!("Phone number must be at most {} characters", MAX_PHONE_LENGTH));
        }

        let message = self.message.unwrap_or_default().trim().to_string();
        validator.check_length("message", &message, MIN_MESSAGE_LENGTH, MAX_MESSAGE_LENGTH, "Message");

        validator.into_result(ContactMessage {
            name,
            email,
            phone,
            message,
        })
    }
}
