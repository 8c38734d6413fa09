pub mod notifier;
pub mod rate_limit;
