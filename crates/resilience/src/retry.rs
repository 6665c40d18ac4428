//! Retry policy with exponential backoff.
//!
//! The delay before attempt `n + 1` is `initial_backoff * multiplier^(n - 1)`,
//! capped at `max_backoff`, then spread by `±jitter_factor` when jitter is on.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    /// Returns true when the failed attempt may be repeated.
    fn is_retryable(&self) -> bool;
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
    /// Relative jitter in `[0, 1)`; zero disables jitter.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// A policy making exactly one attempt.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Starts a fresh backoff sequence for one logical call.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempts: 0,
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut backoff = self.backoff();
        loop {
            let attempt = backoff.begin_attempt();
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => match backoff.next_delay() {
                    Some(delay) => {
                        tracing::debug!(
                            attempt,
                            delay_ms = delay.as_millis(),
                            error = %err,
                            "attempt failed, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::debug!(attempt, error = %err, "retry budget exhausted");
                        return Err(err);
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }
}

/// Backoff state for one logical call.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempts: u32,
}

impl Backoff {
    /// Marks the start of an attempt and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before the next attempt, or `None` when the budget is spent.
    pub fn next_delay(&self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        Some(self.apply_jitter(self.base_delay()))
    }

    fn base_delay(&self) -> Duration {
        let exponent = i32::try_from(self.attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.policy.multiplier.powi(exponent);
        let millis = self.policy.initial_backoff.as_secs_f64() * 1000.0 * factor;
        let capped = millis.min(self.policy.max_backoff.as_secs_f64() * 1000.0);
        Duration::from_secs_f64(capped.max(0.0) / 1000.0)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        let jitter = self.policy.jitter_factor;
        if jitter <= 0.0 {
            return delay;
        }
        let spread = delay.as_secs_f64() * jitter.min(0.99);
        let low = (delay.as_secs_f64() - spread).max(0.0);
        let high = delay.as_secs_f64() + spread;
        Duration::from_secs_f64(rand::rng().random_range(low..=high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (retryable: {})", self.retryable)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    #[test]
    fn delays_double_from_initial() {
        let policy = RetryPolicy::default();
        let mut backoff = policy.backoff();
        let mut delays = Vec::new();
        loop {
            backoff.begin_attempt();
            match backoff.next_delay() {
                Some(delay) => delays.push(delay),
                None => break,
            }
        }
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            max_backoff: Duration::from_secs(3),
            ..RetryPolicy::default()
        };
        let mut backoff = policy.backoff();
        for _ in 0..5 {
            backoff.begin_attempt();
        }
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn jitter_stays_in_range() {
        let policy = RetryPolicy {
            jitter_factor: 0.5,
            ..RetryPolicy::default()
        };
        let mut backoff = policy.backoff();
        backoff.begin_attempt();
        for _ in 0..100 {
            let delay = backoff.next_delay().unwrap();
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn single_attempt_never_delays() {
        let mut backoff = RetryPolicy::single_attempt().backoff();
        backoff.begin_attempt();
        assert_eq!(backoff.next_delay(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_until_success() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result = RetryPolicy::default()
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(TestError { retryable: true })
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { retryable: false }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { retryable: true }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
