//! Sequential retry with exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
///
/// A `multiplier` of 1.0 gives a fixed delay between attempts.
///
/// # Default Values
///
/// - `max_retries`: 2 (three attempts in total)
/// - `initial_delay`: 500ms
/// - `max_delay`: 5 seconds
/// - `multiplier`: 2.0
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap for the backoff delay.
    pub max_delay: Duration,
    /// Growth factor applied per retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Upper bound on attempts, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after the failed attempt numbered `attempt` (0-based).
    ///
    /// `initial_delay * multiplier ^ attempt`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Values below 1.0 are raised to 1.0 so delays never shrink.
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let mut policy = self.policy;
        if !policy.multiplier.is_finite() || policy.multiplier < 1.0 {
            policy.multiplier = 1.0;
        }
        if policy.max_delay < policy.initial_delay {
            policy.max_delay = policy.initial_delay;
        }
        policy
    }
}

/// Last error of a retried operation that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    /// Number of times the operation ran.
    pub attempts: u32,
    /// Error of the final attempt.
    pub error: E,
    /// True if the error was retryable but the retry budget ran out.
    pub exhausted: bool,
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// has run `policy.max_attempts()` times.
///
/// Attempts never overlap: each one is awaited before the backoff delay and
/// the next attempt.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                let attempts = attempt + 1;

                if !is_retryable(&err) {
                    tracing::warn!(attempts, error = %err, "error is not retryable");
                    return Err(RetryFailure {
                        attempts,
                        error: err,
                        exhausted: false,
                    });
                }

                if attempt >= policy.max_retries {
                    tracing::error!(attempts, error = %err, "operation failed after max retries");
                    return Err(RetryFailure {
                        attempts,
                        error: err,
                        exhausted: true,
                    });
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "operation failed, retrying"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
