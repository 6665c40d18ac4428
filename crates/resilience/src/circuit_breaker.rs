//! Count-based circuit breaker.
//!
//! # State Machine
//!
//! ```text
//! CLOSED    → OPEN      (window full and failure rate >= threshold)
//! OPEN      → HALF_OPEN (wait duration elapsed, checked on the next admission)
//! HALF_OPEN → CLOSED    (trial calls complete with failure rate < threshold)
//! HALF_OPEN → OPEN      (trial calls complete with failure rate >= threshold)
//! ```
//!
//! Admission hands out a [`CallPermit`] tagged with the breaker's current
//! epoch. Every transition bumps the epoch, so outcomes of calls admitted
//! before a transition are dropped instead of polluting the new state.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ResilienceError;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected.
    Open,
    /// A limited number of trial calls are let through.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Failure rate, in percent, at or above which the circuit opens.
    pub failure_rate_threshold: f64,
    /// Number of most recent calls evaluated while closed.
    pub sliding_window_size: u32,
    /// Time spent open before trial calls are allowed.
    pub wait_duration_in_open_state: Duration,
    /// Trial calls admitted while half-open.
    pub permitted_calls_in_half_open_state: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_size: 5,
            wait_duration_in_open_state: Duration::from_millis(1000),
            permitted_calls_in_half_open_state: 2,
        }
    }
}

/// Classified result of one protected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

/// Proof of admission; hand it back through [`CircuitBreaker::record`].
#[derive(Debug)]
#[must_use = "the call outcome must be recorded with the permit"]
pub struct CallPermit {
    epoch: u64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    epoch: u64,
    window: VecDeque<CallOutcome>,
    opened_at: Option<Instant>,
    trials_admitted: u32,
    trial_outcomes: Vec<CallOutcome>,
}

/// Circuit breaker shared by every outbound call to one downstream service.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a closed circuit breaker.
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Result<Self, ResilienceError> {
        if !(config.failure_rate_threshold > 0.0 && config.failure_rate_threshold <= 100.0) {
            return Err(ResilienceError::InvalidConfig(format!(
                "failure_rate_threshold must be in (0, 100], got {}",
                config.failure_rate_threshold
            )));
        }
        if config.sliding_window_size == 0 {
            return Err(ResilienceError::InvalidConfig(
                "sliding_window_size must be > 0".to_string(),
            ));
        }
        if config.permitted_calls_in_half_open_state == 0 {
            return Err(ResilienceError::InvalidConfig(
                "permitted_calls_in_half_open_state must be > 0".to_string(),
            ));
        }

        Ok(Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                epoch: 0,
                window: VecDeque::with_capacity(config.sliding_window_size as usize),
                opened_at: None,
                trials_admitted: 0,
                trial_outcomes: Vec::new(),
            }),
            config,
        })
    }

    /// Returns the breaker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state, applying any due OPEN → HALF_OPEN transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.check_wait_elapsed(&mut inner, Instant::now());
        inner.state
    }

    /// Asks for admission of one call.
    pub fn try_acquire(&self) -> Result<CallPermit, ResilienceError> {
        let mut inner = self.lock();
        self.check_wait_elapsed(&mut inner, Instant::now());

        match inner.state {
            CircuitState::Closed => Ok(CallPermit { epoch: inner.epoch }),
            CircuitState::HalfOpen
                if inner.trials_admitted < self.config.permitted_calls_in_half_open_state =>
            {
                inner.trials_admitted += 1;
                Ok(CallPermit { epoch: inner.epoch })
            }
            CircuitState::Open | CircuitState::HalfOpen => {
                drop(inner);
                metrics::counter!("circuit_breaker_rejections_total", "breaker" => self.name.clone())
                    .increment(1);
                Err(ResilienceError::CircuitOpen {
                    name: self.name.clone(),
                })
            }
        }
    }

    /// Records the outcome of a call admitted with `permit`.
    pub fn record(&self, permit: CallPermit, outcome: CallOutcome) {
        let mut inner = self.lock();

        if permit.epoch != inner.epoch {
            tracing::debug!(
                breaker = %self.name,
                state = %inner.state,
                "ignoring outcome of call admitted before last transition"
            );
            return;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.window.push_back(outcome);
                while inner.window.len() > self.config.sliding_window_size as usize {
                    inner.window.pop_front();
                }
                if inner.window.len() == self.config.sliding_window_size as usize
                    && self.exceeds_threshold(inner.window.iter())
                {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.trial_outcomes.push(outcome);
                if inner.trial_outcomes.len()
                    == self.config.permitted_calls_in_half_open_state as usize
                {
                    let next = if self.exceeds_threshold(inner.trial_outcomes.iter()) {
                        CircuitState::Open
                    } else {
                        CircuitState::Closed
                    };
                    self.transition(&mut inner, next);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Returns an unused permit, e.g. when a later gate refused the call.
    ///
    /// Frees the trial slot it held while half-open; no outcome is recorded.
    pub fn release(&self, permit: CallPermit) {
        let mut inner = self.lock();
        if permit.epoch == inner.epoch && inner.state == CircuitState::HalfOpen {
            inner.trials_admitted = inner.trials_admitted.saturating_sub(1);
        }
    }

    /// Forces the breaker back to CLOSED with an empty window.
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitState::Closed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn exceeds_threshold<'a>(&self, outcomes: impl ExactSizeIterator<Item = &'a CallOutcome>) -> bool {
        let total = outcomes.len();
        if total == 0 {
            return false;
        }
        let failures = outcomes.filter(|o| **o == CallOutcome::Failure).count();
        #[allow(clippy::cast_precision_loss)]
        let rate = failures as f64 * 100.0 / total as f64;
        rate >= self.config.failure_rate_threshold
    }

    fn check_wait_elapsed(&self, inner: &mut Inner, now: Instant) {
        if inner.state == CircuitState::Open
            && let Some(opened_at) = inner.opened_at
            && now.saturating_duration_since(opened_at) >= self.config.wait_duration_in_open_state
        {
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.epoch += 1;
        inner.window.clear();
        inner.trials_admitted = 0;
        inner.trial_outcomes.clear();
        inner.opened_at = (to == CircuitState::Open).then(Instant::now);

        metrics::counter!(
            "circuit_breaker_transitions_total",
            "breaker" => self.name.clone(),
            "to" => to.to_string()
        )
        .increment(1);

        match to {
            CircuitState::Open => {
                tracing::warn!(breaker = %self.name, %from, to = %to, "circuit breaker opened");
            }
            CircuitState::HalfOpen | CircuitState::Closed => {
                tracing::info!(breaker = %self.name, %from, to = %to, "circuit breaker transition");
            }
        }
    }
}
