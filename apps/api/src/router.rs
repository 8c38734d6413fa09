use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::appointment_routes;
use appointment_cell::handlers::AppointmentState;
use contact_cell::contact_routes;
use contact_cell::handlers::ContactState;

pub fn create_router(appointments: Arc<AppointmentState>, contact: Arc<ContactState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Bonafide Care API is running!" }))
        .merge(appointment_routes(appointments))
        .merge(contact_routes(contact))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use appointment_cell::services::booking::BookingService;
    use contact_cell::services::rate_limit::RateLimitConfig;
    use contact_cell::{FixedWindowRateLimiter, LogNotifier};
    use shared_config::AppConfig;
    use shared_utils::SystemClock;
    use tebra_cell::TebraClient;

    fn app() -> Router {
        // Default config carries no credentials, so nothing reaches the network.
        let config = AppConfig::default();
        let clock = SystemClock::shared();
        let gateway = Arc::new(TebraClient::new(&config).unwrap());
        let booking = BookingService::from_config(&config, gateway, clock.clone());
        let limiter = FixedWindowRateLimiter::new(RateLimitConfig::from_config(&config), clock);

        create_router(
            Arc::new(AppointmentState::new(Arc::new(booking))),
            Arc::new(ContactState::new(limiter, Arc::new(LogNotifier))),
        )
    }

    #[tokio::test]
    async fn test_liveness() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Bonafide Care API is running!");
    }

    #[tokio::test]
    async fn test_cells_are_mounted() {
        let response = app()
            .oneshot(Request::builder().uri("/bootstrap").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/contact")
                    .body(Body::from("{"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
