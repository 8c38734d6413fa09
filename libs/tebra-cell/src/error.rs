use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TebraError {
    #[error("Tebra credentials not configured")]
    NotConfigured,

    #[error("Failed to encode request: {0}")]
    Encoding(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited by remote service")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Remote service returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Remote service fault: {0}")]
    Fault(String),

    #[error("Remote service failed after {attempts} attempts: {cause}")]
    RemoteService {
        attempts: u32,
        #[source]
        cause: Box<TebraError>,
    },
}

impl TebraError {
    /// Transport failures and every non-2xx status are worth another attempt.
    /// Faults are answers from the service and are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TebraError::Transport(_) | TebraError::RateLimited { .. } | TebraError::Status { .. }
        )
    }
}

impl From<reqwest::Error> for TebraError {
    fn from(err: reqwest::Error) -> Self {
        TebraError::Transport(err.to_string())
    }
}
