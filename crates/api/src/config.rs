//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use orchestrator::PublishMode;
use resilience::{CircuitBreakerConfig, ResilienceConfig, RetryPolicy};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8081`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `INVENTORY_URL`: inventory service base URL (default: `"http://localhost:8082"`)
/// - `DATABASE_URL`: Postgres URL; orders are kept in memory when unset
/// - `PUBLISH_MODE`: `inline` or `detached` (default: `inline`)
/// - `INVENTORY_TIMEOUT_MS` (3000), `INVENTORY_RETRY_MAX` (2),
///   `INVENTORY_RETRY_DELAY_MS` (500), `INVENTORY_RETRY_MAX_DELAY_MS` (5000),
///   `INVENTORY_RETRY_MULTIPLIER` (2.0)
/// - `BREAKER_FAILURE_RATE` (50), `BREAKER_WINDOW_SIZE` (5),
///   `BREAKER_MIN_CALLS` (5), `BREAKER_OPEN_WAIT_MS` (5000),
///   `BREAKER_HALF_OPEN_CALLS` (3)
///
/// Values that do not parse fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub inventory_url: String,
    pub database_url: Option<String>,
    pub publish_mode: PublishMode,
    pub resilience: ResilienceConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let retry_defaults = &defaults.resilience.retry;
        let retry = RetryPolicy::builder()
            .max_retries(parse_or(&lookup, "INVENTORY_RETRY_MAX", retry_defaults.max_retries))
            .initial_delay(millis_or(
                &lookup,
                "INVENTORY_RETRY_DELAY_MS",
                retry_defaults.initial_delay,
            ))
            .max_delay(millis_or(
                &lookup,
                "INVENTORY_RETRY_MAX_DELAY_MS",
                retry_defaults.max_delay,
            ))
            .multiplier(parse_or(
                &lookup,
                "INVENTORY_RETRY_MULTIPLIER",
                retry_defaults.multiplier,
            ))
            .build();

        let breaker_defaults = &defaults.resilience.circuit_breaker;
        let circuit_breaker = CircuitBreakerConfig::builder()
            .failure_rate_threshold(parse_or(
                &lookup,
                "BREAKER_FAILURE_RATE",
                breaker_defaults.failure_rate_threshold,
            ))
            .sliding_window_size(parse_or(
                &lookup,
                "BREAKER_WINDOW_SIZE",
                breaker_defaults.sliding_window_size,
            ))
            .minimum_number_of_calls(parse_or(
                &lookup,
                "BREAKER_MIN_CALLS",
                breaker_defaults.minimum_number_of_calls,
            ))
            .wait_duration_in_open_state(millis_or(
                &lookup,
                "BREAKER_OPEN_WAIT_MS",
                breaker_defaults.wait_duration_in_open_state,
            ))
            .permitted_calls_in_half_open_state(parse_or(
                &lookup,
                "BREAKER_HALF_OPEN_CALLS",
                breaker_defaults.permitted_calls_in_half_open_state,
            ))
            .build();

        Self {
            port: parse_or(&lookup, "PORT", defaults.port),
            log_format: parse_or(&lookup, "LOG_FORMAT", defaults.log_format),
            host: lookup("HOST").unwrap_or(defaults.host),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            inventory_url: lookup("INVENTORY_URL").unwrap_or(defaults.inventory_url),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            publish_mode: lookup("PUBLISH_MODE")
                .and_then(|v| PublishMode::parse(&v))
                .unwrap_or(defaults.publish_mode),
            resilience: ResilienceConfig {
                timeout: millis_or(&lookup, "INVENTORY_TIMEOUT_MS", defaults.resilience.timeout),
                retry,
                circuit_breaker,
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            inventory_url: "http://localhost:8082".to_string(),
            database_url: None,
            publish_mode: PublishMode::Inline,
            resilience: ResilienceConfig::default(),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}
