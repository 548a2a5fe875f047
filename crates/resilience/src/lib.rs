//! Resilience policy for the inventory call.
//!
//! Each attempt passes the circuit breaker, then runs under a wall-clock
//! time limit, and its outcome is recorded by the breaker. Attempts are
//! retried sequentially while the failure is transient. When the breaker
//! rejects, retries run out, or the failure is permanent, the caller gets a
//! [`Fallback`] instead of an error.

pub mod circuit_breaker;
pub mod config;
pub mod policy;
pub mod retry;
pub mod time_limiter;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerMetrics,
    CircuitState,
};
pub use config::ResilienceConfig;
pub use policy::{FALLBACK_MESSAGE, Fallback, FallbackCause, ResilientInventory};
pub use retry::{RetryFailure, RetryPolicy, retry_with_backoff};
pub use time_limiter::TimeLimiter;
