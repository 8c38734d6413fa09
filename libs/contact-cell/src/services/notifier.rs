// libs/contact-cell/src/services/notifier.rs
use async_trait::async_trait;
use tracing::info;

use crate::models::{ContactError, ContactMessage};

/// Hands a validated submission to the clinic.
#[async_trait]
pub trait ContactNotifier: Send + Sync {
    async fn deliver(&self, message: &ContactMessage) -> Result<(), ContactError>;
}

/// Records that a submission arrived. Used when no mail relay is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl ContactNotifier for LogNotifier {
    async fn deliver(&self, message: &ContactMessage) -> Result<(), ContactError> {
        // Contact details stay out of the log.
        info!(
            message_length = message.message.chars().count(),
            "Contact form submission received"
        );
        Ok(())
    }
}
