//! Points delivery error types.

use resilience::{ResilienceError, Retryable};
use thiserror::Error;

/// Failures of a single POST to the points sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The sink answered with a 5xx status.
    #[error("Points sink returned server error {status}: {body}")]
    Server { status: u16, body: String },

    /// The sink answered with a non-success, non-5xx status.
    #[error("Points sink rejected the request with status {status}")]
    Client { status: u16 },

    /// The request never produced a response (connect failure, timeout, reset).
    #[error("Points sink transport error: {0}")]
    Transport(String),

    /// The sink client could not be built.
    #[error("Invalid points sink configuration: {0}")]
    Config(String),
}

impl SinkError {
    /// Whether the outcome counts as a failure for the circuit breaker.
    ///
    /// Server errors always do; transport errors (timeouts included) do as well.
    pub fn is_breaker_failure(&self) -> bool {
        matches!(self, SinkError::Server { .. } | SinkError::Transport(_))
    }
}

impl Retryable for SinkError {
    fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Server { .. } | SinkError::Transport(_))
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        SinkError::Transport(err.to_string())
    }
}

/// Terminal failure of one delivery attempt inside the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutboundError {
    /// A local gate (circuit breaker or rate limiter) refused the attempt.
    #[error(transparent)]
    Rejected(#[from] ResilienceError),

    /// The sink call itself failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl OutboundError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundError::Rejected(ResilienceError::CircuitOpen { .. }) => "circuit_open",
            OutboundError::Rejected(ResilienceError::RateLimited { .. }) => "rate_limited",
            OutboundError::Rejected(ResilienceError::InvalidConfig(_)) => "invalid_config",
            OutboundError::Sink(SinkError::Server { .. }) => "server_error",
            OutboundError::Sink(SinkError::Client { .. }) => "client_error",
            OutboundError::Sink(SinkError::Transport(_)) => "transport",
            OutboundError::Sink(SinkError::Config(_)) => "invalid_config",
        }
    }
}

impl Retryable for OutboundError {
    fn is_retryable(&self) -> bool {
        match self {
            OutboundError::Rejected(_) => false,
            OutboundError::Sink(err) => err.is_retryable(),
        }
    }
}
