pub mod clock;
pub mod extractor;
pub mod test_utils;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
