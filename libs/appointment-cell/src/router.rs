// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // Public: the booking form has no patient login.
    Router::new()
        .route("/availability", get(handlers::get_available_slots))
        .route("/available-dates", get(handlers::get_available_dates))
        .route("/booking", post(handlers::book_appointment))
        .route("/bootstrap", get(handlers::get_bootstrap))
        .with_state(state)
}
