//! Resilience error types.

use thiserror::Error;

/// Local admission failures and configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResilienceError {
    /// The rate limiter had no permit within the acquire timeout.
    #[error("Rate limiter '{name}' refused admission")]
    RateLimited { name: String },

    /// The circuit breaker rejected the call.
    #[error("Circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    /// A primitive was built with unusable settings.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
