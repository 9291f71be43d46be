//! Fixed-interval request pacing.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Paces requests so that consecutive calls are at least one interval apart.
///
/// `wait` sleeps for the remainder of the interval since the previous
/// request, then records the new request time. Contending callers queue on
/// the internal lock, which preserves the pacing across tasks.
pub struct RateLimiter {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Allow `requests` per minute, evenly spaced.
    pub fn per_minute(requests: u32) -> Self {
        let requests = requests.max(1);
        Self::interval(Duration::from_secs_f64(60.0 / f64::from(requests)))
    }

    /// Fixed interval between requests.
    pub fn interval(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the next request is allowed.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_does_not_wait() {
        let limiter = RateLimiter::interval(Duration::from_secs(5));
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_consecutive_calls_by_interval() {
        let limiter = RateLimiter::interval(Duration::from_secs(1));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn per_minute_converts_to_interval() {
        let limiter = RateLimiter::per_minute(100);
        assert_eq!(limiter.interval, Duration::from_secs_f64(0.6));

        let limiter = RateLimiter::per_minute(0);
        assert_eq!(limiter.interval, Duration::from_secs(60));
    }
}
