pub mod client;
pub mod envelope;
pub mod mapping;
pub mod retry;
