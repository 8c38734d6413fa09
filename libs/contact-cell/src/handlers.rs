// libs/contact-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, info};

use shared_models::AppError;
use shared_utils::extractor::client_ip;

use crate::models::ContactPayload;
use crate::services::notifier::ContactNotifier;
use crate::services::rate_limit::FixedWindowRateLimiter;

pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

pub struct ContactState {
    pub rate_limiter: FixedWindowRateLimiter,
    pub notifier: Arc<dyn ContactNotifier>,
}

impl ContactState {
    pub fn new(rate_limiter: FixedWindowRateLimiter, notifier: Arc<dyn ContactNotifier>) -> Self {
        Self {
            rate_limiter,
            notifier,
        }
    }
}

pub async fn submit_contact(
    State(state): State<Arc<ContactState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let ip = client_ip(&headers);

    let remaining = state
        .rate_limiter
        .check(&ip)
        .await
        .map_err(|e| AppError::RateLimited {
            message: "Too many requests. Please try again later.".to_string(),
            retry_after_secs: e.retry_after_secs(),
        })?;

    let payload: ContactPayload = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Invalid request body".to_string()))?;

    let message = payload
        .validate()
        .map_err(|errors| AppError::validation("Validation failed", errors))?;

    state.notifier.deliver(&message).await.map_err(|e| {
        error!("Contact delivery failed: {}", e);
        AppError::Internal("Failed to send message. Please try again later.".to_string())
    })?;

    info!("Contact form submission processed");

    let mut response = Json(json!({
        "success": true,
        "message": "Message sent successfully. We'll get back to you soon.",
    }))
    .into_response();
    response
        .headers_mut()
        .insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));

    Ok(response)
}
