use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use contact_cell::handlers::ContactState;
use contact_cell::services::rate_limit::RateLimitConfig;
use contact_cell::{contact_routes, ContactError, ContactMessage, ContactNotifier, FixedWindowRateLimiter};
use shared_utils::ManualClock;

#[derive(Default)]
struct RecordingNotifier {
    delivered: Mutex<Vec<ContactMessage>>,
    fail: bool,
}

#[async_trait]
impl ContactNotifier for RecordingNotifier {
    async fn deliver(&self, message: &ContactMessage) -> Result<(), ContactError> {
        if self.fail {
            return Err(ContactError::Delivery("relay refused connection".to_string()));
        }
        self.delivered.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn app(max_requests: u32, notifier: Arc<RecordingNotifier>) -> Router {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2030, 6, 3, 12, 0, 0).unwrap()));
    let limiter = FixedWindowRateLimiter::new(
        RateLimitConfig {
            max_requests,
            window: Duration::hours(1),
        },
        clock,
    );
    contact_routes(Arc::new(ContactState::new(limiter, notifier)))
}

fn submission(ip: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/contact")
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn valid_body() -> String {
    json!({
        "name": "Jane Doe",
        "email": "jane@example.com",
        "phone": "555-123-4567",
        "message": "Do you accept walk-ins on Fridays?"
    })
    .to_string()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_valid_submission_is_delivered() {
    let notifier = Arc::new(RecordingNotifier::default());
    let response = app(5, notifier.clone())
        .oneshot(submission("203.0.113.7", &valid_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "4");

    let body = json_body(response).await;
    assert_eq!(body["success"], true);

    let delivered = notifier.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].name, "Jane Doe");
}

#[tokio::test]
async fn test_limit_exceeded_returns_429_with_retry_after() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = app(2, notifier.clone());

    for _ in 0..2 {
        let response = app.clone().oneshot(submission("198.51.100.4", &valid_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(submission("198.51.100.4", &valid_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "3600");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Too many requests. Please try again later.");
    assert_eq!(notifier.delivered.lock().unwrap().len(), 2);

    // A different client is unaffected.
    let response = app.oneshot(submission("192.0.2.1", &valid_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let response = app(5, Arc::new(RecordingNotifier::default()))
        .oneshot(submission("203.0.113.7", "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid request body");
}

#[tokio::test]
async fn test_validation_errors_are_listed_per_field() {
    let notifier = Arc::new(RecordingNotifier::default());
    let body = json!({ "name": "", "email": "jane", "phone": "555", "message": "hi" }).to_string();

    let response = app(5, notifier.clone())
        .oneshot(submission("203.0.113.7", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["errors"]["name"][0], "Name is required");
    assert_eq!(body["errors"]["email"][0], "Invalid email address");
    assert_eq!(body["errors"]["phone"][0], "Valid phone number is required");
    assert_eq!(body["errors"]["message"][0], "Message must be at least 10 characters");
    assert!(notifier.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_delivery_failure_is_internal_error() {
    let notifier = Arc::new(RecordingNotifier {
        fail: true,
        ..Default::default()
    });

    let response = app(5, notifier)
        .oneshot(submission("203.0.113.7", &valid_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Failed to send message. Please try again later.");
    assert!(!body.to_string().contains("relay"));
}
