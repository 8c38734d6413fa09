use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::handlers::AppointmentState;
use appointment_cell::services::booking::BookingService;
use contact_cell::handlers::ContactState;
use contact_cell::services::rate_limit::RateLimitConfig;
use contact_cell::{FixedWindowRateLimiter, LogNotifier};
use shared_config::AppConfig;
use shared_utils::SystemClock;
use tebra_cell::TebraClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Bonafide Care API server");

    // Load configuration
    let config = AppConfig::from_env();
    let clock = SystemClock::shared();

    // Practice-management gateway and booking core
    let gateway = Arc::new(TebraClient::new(&config).context("failed to build Tebra client")?);
    let booking = BookingService::from_config(&config, gateway, clock.clone());
    let appointment_state = Arc::new(AppointmentState::new(Arc::new(booking)));

    // Contact form
    let limiter = FixedWindowRateLimiter::new(RateLimitConfig::from_config(&config), clock);
    let contact_state = Arc::new(ContactState::new(limiter, Arc::new(LogNotifier)));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(appointment_state, contact_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
