//! Outbound delivery pipeline for loyalty-points notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use domain::{Order, PointsPayload};
use resilience::{CallOutcome, CircuitBreaker, RateLimiter, RetryPolicy};

use crate::error::OutboundError;
use crate::sink::PointsSink;

/// Result of delivering one order's points. Never an error: failures are swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The sink accepted the payload.
    Delivered { attempts: u32, response: String },
    /// Delivery failed and was replaced by an empty result.
    Swallowed { attempts: u32, reason: &'static str },
}

impl Delivery {
    /// The sink's response body, or `None` for a swallowed delivery.
    pub fn response(&self) -> Option<&str> {
        match self {
            Delivery::Delivered { response, .. } => Some(response),
            Delivery::Swallowed { .. } => None,
        }
    }

    /// Number of requests that actually reached the network.
    pub fn attempts(&self) -> u32 {
        match self {
            Delivery::Delivered { attempts, .. } | Delivery::Swallowed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Resilient sender of points payloads.
///
/// Circuit breaker and rate limiter are optional so deployments can switch
/// either off; when present they are shared process-wide through `Arc`.
pub struct OutboundPipeline<P: PointsSink> {
    sink: P,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    retry: RetryPolicy,
}

impl<P: PointsSink> OutboundPipeline<P> {
    /// Creates a pipeline making a single, ungated attempt per order.
    pub fn new(sink: P) -> Self {
        Self {
            sink,
            circuit_breaker: None,
            rate_limiter: None,
            retry: RetryPolicy::single_attempt(),
        }
    }

    /// Gates every attempt with the shared circuit breaker.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Gates every attempt with the shared rate limiter.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Retries failed attempts under `policy`.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Returns the circuit breaker, if enabled.
    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.circuit_breaker.as_ref()
    }

    /// Delivers the points earned by `order`, swallowing every downstream failure.
    #[tracing::instrument(skip(self, order), fields(order_id = ?order.id, username = %order.username))]
    pub async fn deliver(&self, order: &Order) -> Delivery {
        let payload = order.points_payload();
        let network_attempts = AtomicU32::new(0);
        let started = Instant::now();

        let result = self
            .retry
            .run(|attempt| self.attempt(&payload, attempt, &network_attempts))
            .await;

        metrics::histogram!("cart_points_delivery_seconds").record(started.elapsed().as_secs_f64());
        let attempts = network_attempts.load(Ordering::Relaxed);

        match result {
            Ok(response) => {
                metrics::counter!("cart_points_delivered_total").increment(1);
                tracing::debug!(attempts, "points delivered");
                Delivery::Delivered { attempts, response }
            }
            Err(err) => {
                let reason = err.kind();
                metrics::counter!("cart_points_swallowed_total", "reason" => reason).increment(1);
                tracing::warn!(attempts, reason, error = %err, "points delivery failed, swallowing");
                Delivery::Swallowed { attempts, reason }
            }
        }
    }

    /// One gated attempt: breaker admission, then a limiter permit, then the POST.
    async fn attempt(
        &self,
        payload: &PointsPayload,
        attempt: u32,
        network_attempts: &AtomicU32,
    ) -> Result<String, OutboundError> {
        let permit = match &self.circuit_breaker {
            Some(breaker) => Some(breaker.try_acquire()?),
            None => None,
        };

        if let Some(limiter) = &self.rate_limiter
            && let Err(err) = limiter.acquire().await
        {
            if let (Some(breaker), Some(permit)) = (&self.circuit_breaker, permit) {
                breaker.release(permit);
            }
            return Err(err.into());
        }

        network_attempts.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cart_points_attempts_total").increment(1);
        tracing::trace!(attempt, "posting points payload");

        let result = self.sink.send(payload).await;

        if let (Some(breaker), Some(permit)) = (&self.circuit_breaker, permit) {
            let outcome = match &result {
                Err(err) if err.is_breaker_failure() => CallOutcome::Failure,
                _ => CallOutcome::Success,
            };
            breaker.record(permit, outcome);
        }

        result.map_err(OutboundError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{InMemoryPointsSink, ScriptedResponse};
    use resilience::{CircuitBreakerConfig, CircuitState, RateLimiterConfig};
    use std::time::Duration;

    fn order() -> Order {
        Order::new("latte", "alice", 2).with_id(1)
    }

    fn breaker() -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new("points", CircuitBreakerConfig::default()).unwrap())
    }

    fn limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new("points", RateLimiterConfig::default()).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_payload_once_when_healthy() {
        let sink = InMemoryPointsSink::new();
        sink.push_responses([ScriptedResponse::Ok("ok".to_string())]);
        let pipeline = OutboundPipeline::new(sink.clone()).with_retry(RetryPolicy::default());

        let delivery = pipeline.deliver(&order()).await;

        assert_eq!(delivery.response(), Some("ok"));
        assert_eq!(delivery.attempts(), 1);
        assert_eq!(
            sink.received(),
            vec![PointsPayload {
                username: "alice".to_string(),
                amount: 2
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_server_errors_until_success() {
        let sink = InMemoryPointsSink::new();
        sink.push_responses([
            ScriptedResponse::ServerError(500),
            ScriptedResponse::ServerError(500),
        ]);
        let pipeline = OutboundPipeline::new(sink.clone())
            .with_retry(RetryPolicy::default())
            .with_circuit_breaker(breaker())
            .with_rate_limiter(limiter());

        let delivery = pipeline.deliver(&order()).await;

        assert!(matches!(delivery, Delivery::Delivered { attempts: 3, .. }));
        let received = sink.received();
        assert_eq!(received.len(), 3);
        assert!(received.iter().all(|p| *p == received[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried_or_counted() {
        let sink = InMemoryPointsSink::new();
        sink.set_fallback(ScriptedResponse::ClientError(400));
        let breaker = breaker();
        let pipeline = OutboundPipeline::new(sink.clone())
            .with_retry(RetryPolicy::default())
            .with_circuit_breaker(breaker.clone());

        for _ in 0..10 {
            let delivery = pipeline.deliver(&order()).await;
            assert_eq!(
                delivery,
                Delivery::Swallowed {
                    attempts: 1,
                    reason: "client_error"
                }
            );
        }
        assert_eq!(sink.call_count(), 10);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_are_swallowed() {
        let sink = InMemoryPointsSink::new();
        sink.set_fallback(ScriptedResponse::Transport);
        let pipeline = OutboundPipeline::new(sink.clone()).with_retry(RetryPolicy::default());

        let delivery = pipeline.deliver(&order()).await;

        assert_eq!(
            delivery,
            Delivery::Swallowed {
                attempts: 5,
                reason: "transport"
            }
        );
        assert_eq!(sink.call_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn open_circuit_skips_network() {
        let sink = InMemoryPointsSink::new();
        sink.set_fallback(ScriptedResponse::ServerError(500));
        let breaker = breaker();
        let pipeline = OutboundPipeline::new(sink.clone())
            .with_retry(RetryPolicy::default())
            .with_circuit_breaker(breaker.clone());

        // Five failed attempts fill the window and open the breaker;
        // the sixth attempt of the same order is rejected locally.
        let first = pipeline.deliver(&order()).await;
        assert_eq!(
            first,
            Delivery::Swallowed {
                attempts: 5,
                reason: "server_error"
            }
        );
        assert_eq!(breaker.state(), CircuitState::Open);

        let second = pipeline.deliver(&order()).await;
        assert_eq!(
            second,
            Delivery::Swallowed {
                attempts: 0,
                reason: "circuit_open"
            }
        );
        assert_eq!(sink.call_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn breaker_recovers_after_wait() {
        let sink = InMemoryPointsSink::new();
        sink.push_responses(std::iter::repeat_n(ScriptedResponse::ServerError(500), 5));
        let breaker = breaker();
        let pipeline = OutboundPipeline::new(sink.clone()).with_circuit_breaker(breaker.clone());

        for _ in 0..5 {
            pipeline.deliver(&order()).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1000)).await;
        pipeline.deliver(&order()).await;
        pipeline.deliver(&order()).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(sink.call_count(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_attempts_are_swallowed() {
        let sink = InMemoryPointsSink::new();
        let pipeline = Arc::new(OutboundPipeline::new(sink.clone()).with_rate_limiter(limiter()));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.deliver(&order()).await })
            })
            .collect();
        let deliveries: Vec<_> = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let delivered = deliveries.iter().filter(|d| d.response().is_some()).count();
        let limited = deliveries
            .iter()
            .filter(|d| {
                **d == Delivery::Swallowed {
                    attempts: 0,
                    reason: "rate_limited",
                }
            })
            .count();
        assert_eq!(delivered, 10);
        assert_eq!(limited, 10);
        assert_eq!(sink.call_count(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_half_open_trial_is_released() {
        let sink = InMemoryPointsSink::new();
        sink.push_responses(std::iter::repeat_n(ScriptedResponse::ServerError(500), 5));
        let breaker = breaker();
        let limiter = Arc::new(
            RateLimiter::new(
                "points",
                RateLimiterConfig {
                    limit_for_period: 5,
                    limit_refresh_period: Duration::from_secs(60),
                    timeout_duration: Duration::ZERO,
                },
            )
            .unwrap(),
        );
        let pipeline = OutboundPipeline::new(sink.clone())
            .with_circuit_breaker(breaker.clone())
            .with_rate_limiter(limiter);

        for _ in 0..5 {
            pipeline.deliver(&order()).await;
        }
        tokio::time::advance(Duration::from_secs(1)).await;

        // Limiter is drained: both trials are refused and handed back.
        for _ in 0..3 {
            let delivery = pipeline.deliver(&order()).await;
            assert_eq!(delivery.attempts(), 0);
        }
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire().is_ok());
    }
}
