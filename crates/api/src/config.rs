//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use resilience::{CircuitBreakerConfig, RateLimiterConfig, RetryPolicy};
use thiserror::Error;

/// Errors in process configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("{var} must be an absolute http(s) URL, got '{value}'")]
    InvalidUrl { var: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `json` in any case selects JSON; anything else, or nothing, selects text.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:8080`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json`
/// - `DATABASE_URL`: PostgreSQL URL; unset selects the in-memory store
/// - `CART_POINTS_SINK_URL`: required downstream points endpoint
/// - `CART_*`: menu and resilience tuning, see the field docs
///
/// Unparseable optional values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// `cart.points-sink-url`.
    pub points_sink_url: String,
    /// Per-request timeout of the sink POST.
    pub sink_timeout: Duration,
    /// JSON property file layered over the environment for `cart.coffees`.
    pub config_file: Option<PathBuf>,
    /// Mirror the menu into the `cafe` table on every refresh.
    pub menu_persist: bool,
    pub rate_limiter_enabled: bool,
    pub rate_limiter: RateLimiterConfig,
    pub circuit_breaker_enabled: bool,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry_enabled: bool,
    pub retry: RetryPolicy,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `RUST_LOG` and `LOG_FORMAT` alone, so tracing can be installed
    /// before the rest of the configuration is parsed.
    pub fn logging_from_env() -> (String, LogFormat) {
        Self::logging_from_lookup(|key| std::env::var(key).ok())
    }

    fn logging_from_lookup<F>(lookup: F) -> (String, LogFormat)
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup("RUST_LOG")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| Self::default().log_level);
        (level, LogFormat::from_setting(lookup("LOG_FORMAT").as_deref()))
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let ms = |key: &str, default: Duration| {
            let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
            Duration::from_millis(parse_or(&lookup, key, default_ms))
        };

        let points_sink_url = lookup("CART_POINTS_SINK_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("CART_POINTS_SINK_URL"))?;
        if !(points_sink_url.starts_with("http://") || points_sink_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl {
                var: "CART_POINTS_SINK_URL",
                value: points_sink_url,
            });
        }

        let (log_level, log_format) = Self::logging_from_lookup(&lookup);

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            log_level,
            log_format,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            points_sink_url,
            sink_timeout: ms("CART_SINK_TIMEOUT_MS", defaults.sink_timeout),
            config_file: lookup("CART_CONFIG_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            menu_persist: parse_or(&lookup, "CART_MENU_PERSIST", defaults.menu_persist),
            rate_limiter_enabled: parse_or(&lookup, "CART_RATE_LIMITER_ENABLED", true),
            rate_limiter: RateLimiterConfig {
                limit_for_period: parse_or(
                    &lookup,
                    "CART_RATE_LIMIT_FOR_PERIOD",
                    defaults.rate_limiter.limit_for_period,
                ),
                limit_refresh_period: ms(
                    "CART_RATE_LIMIT_REFRESH_PERIOD_MS",
                    defaults.rate_limiter.limit_refresh_period,
                ),
                timeout_duration: ms(
                    "CART_RATE_LIMIT_TIMEOUT_MS",
                    defaults.rate_limiter.timeout_duration,
                ),
            },
            circuit_breaker_enabled: parse_or(&lookup, "CART_CIRCUIT_BREAKER_ENABLED", true),
            circuit_breaker: CircuitBreakerConfig {
                failure_rate_threshold: parse_or(
                    &lookup,
                    "CART_CB_FAILURE_RATE_THRESHOLD",
                    defaults.circuit_breaker.failure_rate_threshold,
                ),
                sliding_window_size: parse_or(
                    &lookup,
                    "CART_CB_SLIDING_WINDOW_SIZE",
                    defaults.circuit_breaker.sliding_window_size,
                ),
                wait_duration_in_open_state: ms(
                    "CART_CB_WAIT_DURATION_OPEN_MS",
                    defaults.circuit_breaker.wait_duration_in_open_state,
                ),
                permitted_calls_in_half_open_state: parse_or(
                    &lookup,
                    "CART_CB_PERMITTED_HALF_OPEN",
                    defaults.circuit_breaker.permitted_calls_in_half_open_state,
                ),
            },
            retry_enabled: parse_or(&lookup, "CART_RETRY_ENABLED", true),
            retry: RetryPolicy {
                max_attempts: parse_or(
                    &lookup,
                    "CART_RETRY_MAX_ATTEMPTS",
                    defaults.retry.max_attempts,
                )
                .max(1),
                initial_backoff: ms("CART_RETRY_INITIAL_BACKOFF_MS", defaults.retry.initial_backoff),
                jitter_factor: Some(parse_or(
                    &lookup,
                    "CART_RETRY_JITTER",
                    defaults.retry.jitter_factor,
                ))
                .filter(|j| j.is_finite())
                .map_or(defaults.retry.jitter_factor, |j| j.clamp(0.0, 0.99)),
                ..defaults.retry
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable setting, using default");
            default
        }),
        None => default,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            points_sink_url: "http://localhost:8081/points".to_string(),
            sink_timeout: Duration::from_secs(5),
            config_file: None,
            menu_persist: true,
            rate_limiter_enabled: true,
            rate_limiter: RateLimiterConfig::default(),
            circuit_breaker_enabled: true,
            circuit_breaker: CircuitBreakerConfig::default(),
            retry_enabled: true,
            retry: RetryPolicy::default(),
        }
    }
}
