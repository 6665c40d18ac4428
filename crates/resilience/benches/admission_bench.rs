use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use resilience::{
    CallOutcome, CircuitBreaker, CircuitBreakerConfig, RateLimiter, RateLimiterConfig,
};

fn bench_rate_limiter_try_acquire(c: &mut Criterion) {
    let limiter = RateLimiter::new(
        "bench",
        RateLimiterConfig {
            limit_for_period: u32::MAX,
            limit_refresh_period: Duration::from_secs(1),
            timeout_duration: Duration::ZERO,
        },
    )
    .unwrap();

    c.bench_function("rate_limiter/try_acquire", |b| {
        b.iter(|| limiter.try_acquire().is_ok());
    });
}

fn bench_rate_limiter_refused(c: &mut Criterion) {
    let limiter = RateLimiter::new(
        "bench",
        RateLimiterConfig {
            limit_for_period: 1,
            limit_refresh_period: Duration::from_secs(3600),
            timeout_duration: Duration::ZERO,
        },
    )
    .unwrap();
    let _ = limiter.try_acquire();

    c.bench_function("rate_limiter/refused", |b| {
        b.iter(|| limiter.try_acquire().is_err());
    });
}

fn bench_circuit_breaker_closed_call(c: &mut Criterion) {
    let breaker = CircuitBreaker::new("bench", CircuitBreakerConfig::default()).unwrap();

    c.bench_function("circuit_breaker/closed_acquire_record", |b| {
        b.iter(|| {
            let permit = breaker.try_acquire().unwrap();
            breaker.record(permit, CallOutcome::Success);
        });
    });
}

fn bench_circuit_breaker_open_reject(c: &mut Criterion) {
    let breaker = CircuitBreaker::new(
        "bench",
        CircuitBreakerConfig {
            wait_duration_in_open_state: Duration::from_secs(3600),
            ..CircuitBreakerConfig::default()
        },
    )
    .unwrap();
    for _ in 0..5 {
        let permit = breaker.try_acquire().unwrap();
        breaker.record(permit, CallOutcome::Failure);
    }

    c.bench_function("circuit_breaker/open_reject", |b| {
        b.iter(|| breaker.try_acquire().is_err());
    });
}

criterion_group!(
    benches,
    bench_rate_limiter_try_acquire,
    bench_rate_limiter_refused,
    bench_circuit_breaker_closed_call,
    bench_circuit_breaker_open_reject,
);
criterion_main!(benches);
