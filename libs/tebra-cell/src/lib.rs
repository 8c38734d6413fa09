// =====================================================================================
// TEBRA CELL - PRACTICE MANAGEMENT GATEWAY (KAREO SOAP API)
// =====================================================================================

pub mod error;
pub mod models;
pub mod services;

pub use error::TebraError;
pub use models::*;
pub use services::client::{PracticeApi, TebraClient};
pub use services::retry::RetryPolicy;

#[cfg(any(test, feature = "mocks"))]
pub use services::client::MockPracticeApi;
