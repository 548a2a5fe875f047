//! The inventory call wrapped in time limit, retry and circuit breaker.

use std::collections::BTreeSet;
use std::time::Instant;

use domain::{SkuAvailability, SkuCode};
use inventory::{InventoryClient, InventoryError};
use thiserror::Error;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::config::ResilienceConfig;
use crate::retry::{RetryFailure, RetryPolicy, retry_with_backoff};
use crate::time_limiter::TimeLimiter;

/// Message returned to callers whenever the inventory check degrades.
pub const FALLBACK_MESSAGE: &str = "Oops! Something went wrong, please order after some time!";

/// What made the inventory check fall back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    /// The breaker rejected the attempt without calling inventory.
    CircuitOpen,
    /// Every permitted attempt failed with a transient error.
    RetriesExhausted(InventoryError),
    /// An attempt failed with an error that retrying cannot fix.
    NonTransient(InventoryError),
}

impl FallbackCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackCause::CircuitOpen => "circuit_open",
            FallbackCause::RetriesExhausted(_) => "retries_exhausted",
            FallbackCause::NonTransient(_) => "non_transient",
        }
    }

    /// The last inventory error, if inventory was reached at all.
    pub fn error(&self) -> Option<&InventoryError> {
        match self {
            FallbackCause::CircuitOpen => None,
            FallbackCause::RetriesExhausted(err) | FallbackCause::NonTransient(err) => Some(err),
        }
    }
}

/// Degraded outcome of the inventory check.
///
/// Terminal: the caller must not retry on top of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", FALLBACK_MESSAGE)]
pub struct Fallback {
    pub cause: FallbackCause,
    /// Attempts made, one rejected by the breaker included.
    pub attempts: u32,
}

impl Fallback {
    pub fn message(&self) -> &'static str {
        FALLBACK_MESSAGE
    }
}

/// Inventory client guarded by the resilience policy.
///
/// One breaker is shared by every order placed through this instance.
#[derive(Debug, Clone)]
pub struct ResilientInventory<C> {
    client: C,
    breaker: CircuitBreaker,
    time_limiter: TimeLimiter,
    retry: RetryPolicy,
}

impl<C: InventoryClient> ResilientInventory<C> {
    /// Wraps `client` with a fresh breaker named `inventory`.
    pub fn new(client: C, config: &ResilienceConfig) -> Self {
        let breaker = CircuitBreaker::new("inventory", config.circuit_breaker.clone());
        Self::with_breaker(client, config, breaker)
    }

    /// Wraps `client` with an existing breaker.
    pub fn with_breaker(client: C, config: &ResilienceConfig, breaker: CircuitBreaker) -> Self {
        Self {
            client,
            breaker,
            time_limiter: TimeLimiter::new(config.timeout),
            retry: config.retry.clone(),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Asks inventory about `skus`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`Fallback`] when the breaker is open, retries run out, or
    /// inventory answers with something unusable.
    #[tracing::instrument(skip(self, skus), fields(sku_count = skus.len()))]
    pub async fn check_availability(
        &self,
        skus: &BTreeSet<SkuCode>,
    ) -> Result<Vec<SkuAvailability>, Fallback> {
        let started = Instant::now();

        let result = retry_with_backoff(
            &self.retry,
            || self.attempt(skus),
            |err: &CircuitBreakerError<InventoryError>| {
                matches!(err, CircuitBreakerError::Inner(inner) if inner.is_transient())
            },
        )
        .await;

        metrics::histogram!("inventory_check_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result.map_err(|failure| {
            let fallback = Self::to_fallback(failure);
            metrics::counter!("inventory_fallbacks_total", "cause" => fallback.cause.as_str())
                .increment(1);
            tracing::warn!(
                cause = fallback.cause.as_str(),
                attempts = fallback.attempts,
                "inventory check fell back"
            );
            fallback
        })
    }

    async fn attempt(
        &self,
        skus: &BTreeSet<SkuCode>,
    ) -> Result<Vec<SkuAvailability>, CircuitBreakerError<InventoryError>> {
        self.breaker
            .call(|| {
                self.time_limiter.run(
                    self.client.check_availability(skus),
                    InventoryError::RemoteTimeout,
                )
            })
            .await
    }

    fn to_fallback(failure: RetryFailure<CircuitBreakerError<InventoryError>>) -> Fallback {
        let cause = match failure.error {
            CircuitBreakerError::Open => FallbackCause::CircuitOpen,
            CircuitBreakerError::Inner(err) if failure.exhausted => {
                FallbackCause::RetriesExhausted(err)
            }
            CircuitBreakerError::Inner(err) => FallbackCause::NonTransient(err),
        };
        Fallback {
            cause,
            attempts: failure.attempts,
        }
    }
}
