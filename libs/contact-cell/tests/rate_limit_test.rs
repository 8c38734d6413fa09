use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};

use contact_cell::services::rate_limit::RateLimitConfig;
use contact_cell::{FixedWindowRateLimiter, RateLimitError};
use shared_utils::ManualClock;

fn limiter(max_requests: u32, window: Duration) -> (FixedWindowRateLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2030, 6, 3, 12, 0, 0).unwrap()));
    let limiter = FixedWindowRateLimiter::new(
        RateLimitConfig {
            max_requests,
            window,
        },
        clock.clone(),
    );
    (limiter, clock)
}

#[tokio::test]
async fn test_allows_up_to_max_then_rejects() {
    let (limiter, _clock) = limiter(5, Duration::hours(1));

    for expected_remaining in (0..5).rev() {
        assert_eq!(limiter.check("203.0.113.7").await.unwrap(), expected_remaining);
    }

    assert_matches!(
        limiter.check("203.0.113.7").await,
        Err(RateLimitError::LimitExceeded { retry_after }) if retry_after == Duration::hours(1)
    );
}

#[tokio::test]
async fn test_retry_after_counts_down_to_window_reset() {
    let (limiter, clock) = limiter(1, Duration::hours(1));

    limiter.check("ip").await.unwrap();
    clock.advance(Duration::minutes(20));

    let err = limiter.check("ip").await.unwrap_err();
    assert_eq!(
        err,
        RateLimitError::LimitExceeded {
            retry_after: Duration::minutes(40)
        }
    );
    assert_eq!(err.retry_after_secs(), 40 * 60);
}

#[tokio::test]
async fn test_window_resets_after_expiry() {
    let (limiter, clock) = limiter(2, Duration::hours(1));

    limiter.check("ip").await.unwrap();
    limiter.check("ip").await.unwrap();
    assert!(limiter.check("ip").await.is_err());

    clock.advance(Duration::hours(1));

    assert_eq!(limiter.check("ip").await.unwrap(), 1);
}

#[tokio::test]
async fn test_clients_are_counted_independently() {
    let (limiter, _clock) = limiter(1, Duration::hours(1));

    limiter.check("a").await.unwrap();
    assert!(limiter.check("a").await.is_err());
    assert_eq!(limiter.check("b").await.unwrap(), 0);
    assert_eq!(limiter.remaining("a").await, 0);
    assert_eq!(limiter.remaining("never-seen").await, 1);
}

#[tokio::test]
async fn test_expired_windows_are_pruned() {
    let (limiter, clock) = limiter(5, Duration::minutes(10));

    limiter.check("a").await.unwrap();
    limiter.check("b").await.unwrap();
    assert_eq!(limiter.tracked_clients().await, 2);

    clock.advance(Duration::minutes(11));
    limiter.check("c").await.unwrap();

    assert_eq!(limiter.tracked_clients().await, 1);
}
