//! Request spacing for the timetable site.

use std::time::{Duration, Instant};

/// Enforces a minimum interval between consecutive requests.
///
/// Shared behind a mutex by concurrent week fetches, so requests leave in
/// a spaced sequence even when several are in flight.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum interval between requests.
    min_interval: Duration,
    /// Last request timestamp.
    last_request: Option<Instant>,
}

impl RateLimiter {
    /// Creates a new rate limiter.
    pub(crate) const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Waits until the next request is allowed, then records it.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = Instant::now().duration_since(last);
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval.saturating_sub(elapsed)).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}
