//! Token-bucket rate limiter for exchange REST calls.
//!
//! Each pooled exchange client owns one limiter, so the per-symbol fan-out of
//! a single request cannot burst past the exchange's weight limits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

/// Limiter settings.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Requests allowed per refill interval.
    pub max_requests: usize,
    pub refill_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { max_requests: 10, refill_interval: Duration::from_secs(1) }
    }
}

impl RateLimiterConfig {
    pub fn per_second(requests: u32) -> Self {
        Self { max_requests: requests.max(1) as usize, ..Self::default() }
    }
}

/// Token bucket: permits are consumed on acquire and topped back up to
/// `max_requests` once per elapsed interval.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    max_permits: usize,
    last_refill: Arc<Mutex<Instant>>,
    refill_interval: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_requests)),
            max_permits: config.max_requests,
            last_refill: Arc::new(Mutex::new(Instant::now())),
            refill_interval: config.refill_interval,
        }
    }

    /// Wait until a request may be sent.
    pub async fn acquire(&self) {
        loop {
            self.try_refill().await;
            if let Ok(permit) = self.permits.try_acquire() {
                permit.forget();
                return;
            }
            // Nothing left in this window; sleep until the next refill.
            let wait = {
                let last = self.last_refill.lock().await;
                self.refill_interval.saturating_sub(last.elapsed())
            };
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Take a permit if one is available right now.
    pub async fn try_acquire(&self) -> bool {
        self.try_refill().await;
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn try_refill(&self) {
        let mut last_refill = self.last_refill.lock().await;
        if last_refill.elapsed() >= self.refill_interval {
            let current = self.permits.available_permits();
            let to_add = self.max_permits.saturating_sub(current);
            if to_add > 0 {
                self.permits.add_permits(to_add);
            }
            *last_refill = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausts_then_refuses() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_requests: 2,
            refill_interval: Duration::from_secs(60),
        });
        assert!(limiter.try_acquire().await);
        limiter.acquire().await;
        assert_eq!(limiter.available_permits(), 0);
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn refills_after_interval() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_requests: 1,
            refill_interval: Duration::from_millis(30),
        });
        limiter.acquire().await;
        // Blocks until the next window instead of failing.
        tokio::time::timeout(Duration::from_secs(2), limiter.acquire())
            .await
            .expect("permit after refill");
    }

    #[test]
    fn per_second_never_zero() {
        assert_eq!(RateLimiterConfig::per_second(0).max_requests, 1);
        assert_eq!(RateLimiterConfig::per_second(7).max_requests, 7);
    }
}
