// =====================================================================================
// CONTACT CELL - RATE-LIMITED CONTACT FORM
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{ContactError, ContactMessage};
pub use router::contact_routes;
pub use services::notifier::{ContactNotifier, LogNotifier};
pub use services::rate_limit::{FixedWindowRateLimiter, RateLimitError};
