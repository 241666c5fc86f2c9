//! Minimum-interval call gate shared by every caller of one external service.
//!
//! The interval is measured from the start of the previous permitted call.
//! The lock is held while sleeping, so concurrent callers queue up and are
//! released one interval apart.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Explicit limiter object; clone an `Arc<RateLimiter>` to share it.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call may start, then record its start time.
    pub async fn acquire(&self) {
        let mut last = self.last_start.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tracing::trace!(wait_ms = (ready_at - now).as_millis() as u64, "rate limit wait");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
