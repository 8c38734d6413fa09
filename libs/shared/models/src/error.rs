use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Field name to the list of messages reported for it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Validation error: {message}")]
    ValidationError { message: String, errors: FieldErrors },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests, retry after {retry_after_secs}s")]
    RateLimited { message: String, retry_after_secs: u64 },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, errors: FieldErrors) -> Self {
        AppError::ValidationError {
            message: message.into(),
            errors,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Messages are user-facing summaries; request payloads never reach this log line.
        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, self);
        } else {
            tracing::warn!("Error: {}: {}", status, self);
        }

        match self {
            AppError::ValidationError { message, errors } => {
                let body = Json(json!({
                    "success": false,
                    "error": message,
                    "errors": errors,
                }));
                (status, body).into_response()
            }
            AppError::RateLimited { message, retry_after_secs } => {
                let body = Json(json!({
                    "success": false,
                    "error": message,
                }));
                let mut response = (status, body).into_response();
                let headers = response.headers_mut();
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
                response
            }
            AppError::BadRequest(message)
            | AppError::Conflict(message)
            | AppError::ServiceUnavailable(message)
            | AppError::Internal(message) => {
                let body = Json(json!({
                    "success": false,
                    "error": message,
                }));
                (status, body).into_response()
            }
        }
    }
}
