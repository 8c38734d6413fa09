// =====================================================================================
// APPOINTMENT CELL - AVAILABILITY AND ONLINE BOOKING
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{BookingError, BookingStage};
pub use router::appointment_routes;
