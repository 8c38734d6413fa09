// libs/contact-cell/src/services/rate_limit.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use shared_config::AppConfig;
use shared_utils::Clock;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Rate limit exceeded, retry after {retry_after}")]
    LimitExceeded { retry_after: Duration },
}

impl RateLimitError {
    /// Whole seconds for a `Retry-After` header, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        let RateLimitError::LimitExceeded { retry_after } = self;
        let millis = retry_after.num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_requests: config.rate_limit_max.max(1),
            window: Duration::milliseconds(config.rate_limit_window_ms.max(1) as i64),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug)]
struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Per-client counter over fixed windows. The first request from a client opens
/// a window `[now, now + window)`; the counter resets only when it closes.
/// Lives in process memory and is lost on restart.
pub struct FixedWindowRateLimiter {
    windows: RwLock<HashMap<String, WindowEntry>>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl FixedWindowRateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counts one request for `identifier`. Returns the requests left in the
    /// current window.
    #[instrument(skip(self))]
    pub async fn check(&self, identifier: &str) -> Result<u32, RateLimitError> {
        let now = self.clock.now();
        let mut windows = self.windows.write().await;

        windows.retain(|_, entry| entry.reset_at > now);

        let max = self.config.max_requests;
        match windows.get_mut(identifier) {
            None => {
                windows.insert(
                    identifier.to_string(),
                    WindowEntry {
                        count: 1,
                        reset_at: now + self.config.window,
                    },
                );
                debug!("Opened rate-limit window for {}", identifier);
                Ok(max - 1)
            }
            Some(entry) if entry.count >= max => {
                warn!("Rate limit exceeded for {}", identifier);
                Err(RateLimitError::LimitExceeded {
                    retry_after: entry.reset_at - now,
                })
            }
            Some(entry) => {
                entry.count += 1;
                Ok(max - entry.count)
            }
        }
    }

    /// Requests left for `identifier` without counting one.
    pub async fn remaining(&self, identifier: &str) -> u32 {
        let now = self.clock.now();
        let windows = self.windows.read().await;

        match windows.get(identifier) {
            Some(entry) if entry.reset_at > now => self.config.max_requests.saturating_sub(entry.count),
            _ => self.config.max_requests,
        }
    }

    /// Number of clients with an open window.
    pub async fn tracked_clients(&self) -> usize {
        self.windows.read().await.len()
    }
}
