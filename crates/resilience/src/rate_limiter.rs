//! Fixed-window rate limiter.
//!
//! Time is divided into cycles of `limit_refresh_period` starting at the
//! limiter's creation. Each cycle grants `limit_for_period` permits. A caller
//! that finds no permit left may reserve one from an upcoming cycle, provided
//! that cycle starts within `timeout_duration`; otherwise it is refused.
//!
//! Reservations are taken under a lock, so waiters are admitted in the order
//! they reserved, and reserved permits are deducted from the cycle they wait for.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ResilienceError;

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Permits granted per refresh period.
    pub limit_for_period: u32,
    /// Length of one window.
    pub limit_refresh_period: Duration,
    /// Longest a caller may wait for the next window.
    pub timeout_duration: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit_for_period: 10,
            limit_refresh_period: Duration::from_secs(1),
            timeout_duration: Duration::from_millis(25),
        }
    }
}

#[derive(Debug)]
struct WindowState {
    cycle: u64,
    /// Remaining permits in `cycle`; negative when permits of later cycles are reserved.
    permits: i64,
}

/// Process-wide limiter for outbound calls.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    config: RateLimiterConfig,
    origin: Instant,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Creates a limiter whose first window starts now.
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Result<Self, ResilienceError> {
        if config.limit_for_period == 0 {
            return Err(ResilienceError::InvalidConfig(
                "limit_for_period must be > 0".to_string(),
            ));
        }
        if config.limit_refresh_period.is_zero() {
            return Err(ResilienceError::InvalidConfig(
                "limit_refresh_period must be > 0".to_string(),
            ));
        }

        Ok(Self {
            name: name.into(),
            state: Mutex::new(WindowState {
                cycle: 0,
                permits: i64::from(config.limit_for_period),
            }),
            config,
            origin: Instant::now(),
        })
    }

    /// Returns the limiter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires one permit, waiting at most `timeout_duration` for the next window.
    pub async fn acquire(&self) -> Result<(), ResilienceError> {
        let wait = self.reserve(Instant::now())?;
        if !wait.is_zero() {
            tracing::trace!(limiter = %self.name, wait_ms = wait.as_millis(), "waiting for next window");
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }

    /// Acquires a permit only if one is available in the current window.
    pub fn try_acquire(&self) -> Result<(), ResilienceError> {
        // A zero timeout never reserves ahead, so success means an immediate permit.
        self.reserve_within(Instant::now(), Duration::ZERO)
            .map(|_| ())
    }

    /// Permits left in the current window; negative while later windows are reserved.
    pub fn available_permits(&self) -> i64 {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh(&mut state, now);
        state.permits
    }

    fn reserve(&self, now: Instant) -> Result<Duration, ResilienceError> {
        self.reserve_within(now, self.config.timeout_duration)
    }

    fn reserve_within(&self, now: Instant, timeout: Duration) -> Result<Duration, ResilienceError> {
        let limit = i64::from(self.config.limit_for_period);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh(&mut state, now);

        if state.permits > 0 {
            state.permits -= 1;
            return Ok(Duration::ZERO);
        }

        let deficit = state.permits.unsigned_abs();
        let cycles_ahead = deficit / limit.unsigned_abs() + 1;
        let ready_at = self.cycle_start(state.cycle.saturating_add(cycles_ahead));
        let wait = ready_at.saturating_duration_since(now);

        if wait > timeout {
            drop(state);
            metrics::counter!("rate_limiter_rejections_total", "limiter" => self.name.clone())
                .increment(1);
            tracing::debug!(limiter = %self.name, wait_ms = wait.as_millis(), "permit refused");
            return Err(ResilienceError::RateLimited {
                name: self.name.clone(),
            });
        }

        state.permits -= 1;
        Ok(wait)
    }

    /// Rolls the window forward to the cycle containing `now`.
    fn refresh(&self, state: &mut WindowState, now: Instant) {
        let elapsed = now.saturating_duration_since(self.origin);
        let period = self.config.limit_refresh_period.as_nanos();
        let cycle = u64::try_from(elapsed.as_nanos() / period).unwrap_or(u64::MAX);

        if cycle > state.cycle {
            let limit = i64::from(self.config.limit_for_period);
            let refills = i64::try_from(cycle - state.cycle).unwrap_or(i64::MAX);
            state.permits = state
                .permits
                .saturating_add(refills.saturating_mul(limit))
                .min(limit);
            state.cycle = cycle;
        }
    }

    fn cycle_start(&self, cycle: u64) -> Instant {
        let nanos = self
            .config
            .limit_refresh_period
            .as_nanos()
            .saturating_mul(u128::from(cycle));
        self.origin + Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(limit: u32, period_ms: u64, timeout_ms: u64) -> RateLimiter {
        RateLimiter::new(
            "test",
            RateLimiterConfig {
                limit_for_period: limit,
                limit_refresh_period: Duration::from_millis(period_ms),
                timeout_duration: Duration::from_millis(timeout_ms),
            },
        )
        .unwrap()
    }

    #[test]
    fn defaults_match_service_settings() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.limit_for_period, 10);
        assert_eq!(config.limit_refresh_period, Duration::from_secs(1));
        assert_eq!(config.timeout_duration, Duration::from_millis(25));
    }

    #[test]
    fn rejects_zero_limit() {
        let result = RateLimiter::new(
            "bad",
            RateLimiterConfig {
                limit_for_period: 0,
                ..RateLimiterConfig::default()
            },
        );
        assert!(matches!(result, Err(ResilienceError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_limit_then_refuses() {
        let limiter = limiter(10, 1000, 25);

        for _ in 0..10 {
            limiter.acquire().await.unwrap();
        }
        let err = limiter.acquire().await.unwrap_err();
        assert_eq!(
            err,
            ResilienceError::RateLimited {
                name: "test".to_string()
            }
        );
        assert_eq!(limiter.available_permits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refills_at_next_window() {
        let limiter = limiter(2, 1000, 25);
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        assert!(limiter.try_acquire().is_err());

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(limiter.available_permits(), 2);
        limiter.acquire().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_window_within_timeout() {
        let limiter = limiter(1, 1000, 25);
        limiter.acquire().await.unwrap();

        tokio::time::advance(Duration::from_millis(990)).await;
        let start = Instant::now();
        limiter.acquire().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(10));

        // The reserved permit was taken from the new window.
        assert_eq!(limiter.available_permits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reservations_are_deducted_from_next_window() {
        let limiter = Arc::new(limiter(2, 1000, 25));
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();

        tokio::time::advance(Duration::from_millis(980)).await;
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await.is_ok() })
            })
            .collect();

        let results = futures_util::future::join_all(handles).await;
        let admitted = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(admitted, 2);
        assert_eq!(limiter.available_permits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn never_admits_more_than_limit_per_window() {
        let limiter = Arc::new(limiter(10, 1000, 25));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await.is_ok() })
            })
            .collect();

        let results = futures_util::future::join_all(handles).await;
        let admitted = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(admitted, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_windows_do_not_accumulate_permits() {
        let limiter = limiter(3, 100, 0);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(limiter.available_permits(), 3);
    }
}
