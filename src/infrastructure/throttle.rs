//! Process-wide send throttle in front of the mail gateway.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Fixed-interval throttle shared by every send loop.
///
/// One permit is released per `interval` with a burst of one, so a single
/// campaign sees a fixed delay between attempts and concurrent campaigns
/// split the same gateway quota instead of multiplying it.
pub struct SendThrottle {
    limiter: Option<DefaultDirectRateLimiter>,
    interval: Duration,
}

impl SendThrottle {
    /// Creates a throttle releasing one permit per `interval`.
    ///
    /// A zero interval disables throttling.
    pub fn new(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));

        Self { limiter, interval }
    }

    /// A throttle that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Waits until the next send attempt is allowed.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_disabled_throttle_never_waits() {
        let throttle = SendThrottle::disabled();
        assert!(!throttle.is_enabled());

        let started = Instant::now();
        for _ in 0..100 {
            throttle.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_attempts_are_spaced_by_interval() {
        let throttle = SendThrottle::new(Duration::from_millis(30));
        assert!(throttle.is_enabled());
        assert_eq!(throttle.interval(), Duration::from_millis(30));

        let started = Instant::now();
        for _ in 0..3 {
            throttle.acquire().await;
        }
        // The first permit is immediate, the next two wait one interval each.
        assert!(started.elapsed() >= Duration::from_millis(55));
    }
}
