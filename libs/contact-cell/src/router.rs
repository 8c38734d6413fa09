// libs/contact-cell/src/router.rs
use std::sync::Arc;

use axum::{routing::post, Router};

use crate::handlers::{self, ContactState};

pub fn contact_routes(state: Arc<ContactState>) -> Router {
    Router::new()
        .route("/contact", post(handlers::submit_contact))
        .with_state(state)
}
