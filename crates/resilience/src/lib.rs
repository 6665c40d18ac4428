//! Resilience primitives for calls to unreliable downstream services.
//!
//! - [`RateLimiter`]: fixed-window limiter, at most `limit_for_period`
//!   admissions per refresh period, with a bounded wait for the next window
//! - [`CircuitBreaker`]: count-based sliding window, Closed/Open/HalfOpen
//! - [`RetryPolicy`]: exponential backoff with optional jitter
//!
//! Limiter and breaker are meant to be built once per process and shared
//! behind an `Arc`; both are safe under concurrent admission attempts.

pub mod circuit_breaker;
pub mod error;
pub mod rate_limiter;
pub mod retry;

pub use circuit_breaker::{
    CallOutcome, CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};
pub use error::ResilienceError;
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::{Backoff, RetryPolicy, Retryable};
