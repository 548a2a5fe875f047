//! Circuit breaker over a count-based sliding window.
//!
//! # States
//!
//! - **Closed**: calls pass through and their outcomes fill the window. Once
//!   the window holds at least `minimum_number_of_calls` outcomes and the
//!   failure rate reaches `failure_rate_threshold`, the breaker opens.
//! - **Open**: calls are rejected without running until
//!   `wait_duration_in_open_state` has passed.
//! - **HalfOpen**: up to `permitted_calls_in_half_open_state` trial calls
//!   are let through. One failure re-opens the breaker; that many successes
//!   close it with an empty window.
//!
//! Every state change bumps a generation counter. Outcomes of calls admitted
//! under an older generation still count in [`CircuitBreakerMetrics`] but
//! never in the current window.
//!
//! ```rust
//! use resilience::{CircuitBreaker, CircuitBreakerConfig};
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new("inventory", CircuitBreakerConfig::default());
//! let result = breaker.call(|| async { Ok::<_, String>(42) }).await;
//! assert!(result.is_ok());
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Failure rate in percent (0, 100] at which the breaker opens.
    pub failure_rate_threshold: f64,
    /// Number of most recent outcomes kept in the window.
    pub sliding_window_size: usize,
    /// Outcomes required in the window before the rate is evaluated.
    pub minimum_number_of_calls: usize,
    /// How long the breaker stays open before allowing trial calls.
    pub wait_duration_in_open_state: Duration,
    /// Trial calls allowed while half-open.
    pub permitted_calls_in_half_open_state: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_size: 5,
            minimum_number_of_calls: 5,
            wait_duration_in_open_state: Duration::from_secs(5),
            permitted_calls_in_half_open_state: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Brings out-of-range values back into range.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.sliding_window_size = self.sliding_window_size.max(1);
        self.minimum_number_of_calls = self
            .minimum_number_of_calls
            .clamp(1, self.sliding_window_size);
        self.permitted_calls_in_half_open_state = self.permitted_calls_in_half_open_state.max(1);
        if !self.failure_rate_threshold.is_finite() || self.failure_rate_threshold <= 0.0 {
            self.failure_rate_threshold = 50.0;
        }
        self.failure_rate_threshold = self.failure_rate_threshold.min(100.0);
        self
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    #[must_use]
    pub fn failure_rate_threshold(mut self, percent: f64) -> Self {
        self.config.failure_rate_threshold = percent;
        self
    }

    #[must_use]
    pub fn sliding_window_size(mut self, size: usize) -> Self {
        self.config.sliding_window_size = size;
        self
    }

    #[must_use]
    pub fn minimum_number_of_calls(mut self, calls: usize) -> Self {
        self.config.minimum_number_of_calls = calls;
        self
    }

    #[must_use]
    pub fn wait_duration_in_open_state(mut self, duration: Duration) -> Self {
        self.config.wait_duration_in_open_state = duration;
        self
    }

    #[must_use]
    pub fn permitted_calls_in_half_open_state(mut self, calls: usize) -> Self {
        self.config.permitted_calls_in_half_open_state = calls;
        self
    }

    #[must_use]
    pub fn build(self) -> CircuitBreakerConfig {
        self.config.sanitized()
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through normally.
    Closed,
    /// Calls are rejected immediately.
    Open,
    /// A limited number of trial calls pass through.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from circuit breaker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, request rejected without running.
    #[error("Circuit breaker is open")]
    Open,
    /// Operation ran and failed.
    #[error("Operation failed: {0}")]
    Inner(E),
}

/// Lifetime counters of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    /// Calls that were admitted and ran.
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    /// Calls rejected without running.
    pub rejections: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    generation: u64,
    /// `true` marks a failed call.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_admitted: usize,
    half_open_successes: usize,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            generation: 0,
            window: VecDeque::new(),
            opened_at: None,
            half_open_admitted: 0,
            half_open_successes: 0,
        }
    }

    fn failure_rate(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        let failures = self.window.iter().filter(|failed| **failed).count();
        Some(failures as f64 * 100.0 / self.window.len() as f64)
    }
}

/// Circuit breaker shared by every caller of one downstream.
///
/// Cloning is cheap and yields a handle to the same state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<BreakerState>>,
    calls: Arc<AtomicU64>,
    successes: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
    rejections: Arc<AtomicU64>,
}

/// Admission ticket for one call; releases its half-open slot if the call
/// is dropped before finishing.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.generation);
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker named after the downstream it guards.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            config: Arc::new(config.sanitized()),
            state: Arc::new(Mutex::new(BreakerState::new())),
            calls: Arc::new(AtomicU64::new(0)),
            successes: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(AtomicU64::new(0)),
            rejections: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// The current state. An open breaker whose wait has elapsed still
    /// reports `Open` until the next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Failure rate in percent of the outcomes currently in the window.
    pub fn failure_rate(&self) -> Option<f64> {
        self.lock().failure_rate()
    }

    /// Call an operation through the circuit breaker.
    ///
    /// # Errors
    ///
    /// Returns `CircuitBreakerError::Open` without running `operation` if
    /// the breaker rejects the call, and `CircuitBreakerError::Inner` if
    /// the operation fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(mut permit) = self.try_acquire() else {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("circuit_breaker_rejections_total", "breaker" => self.name.to_string())
                .increment(1);
            tracing::warn!(breaker = %self.name, "circuit breaker is OPEN, rejecting call");
            return Err(CircuitBreakerError::Open);
        };

        self.calls.fetch_add(1, Ordering::Relaxed);
        let result = operation().await;
        permit.settled = true;

        match result {
            Ok(value) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                self.on_success(permit.generation);
                Ok(value)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.on_failure(permit.generation);
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Get circuit breaker metrics.
    #[must_use]
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            calls: self.calls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }

    /// Force the breaker back to closed with an empty window.
    pub fn reset(&self) {
        let mut state = self.lock();
        tracing::info!(breaker = %self.name, "circuit breaker manually reset to CLOSED");
        self.transition(&mut state, CircuitState::Closed);
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // No code path panics while holding the lock; recover regardless.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut state = self.lock();

        if state.state == CircuitState::Open {
            let waited_enough = state
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.config.wait_duration_in_open_state);
            if !waited_enough {
                return None;
            }
            self.transition(&mut state, CircuitState::HalfOpen);
        }

        if state.state == CircuitState::HalfOpen {
            if state.half_open_admitted >= self.config.permitted_calls_in_half_open_state {
                return None;
            }
            state.half_open_admitted += 1;
        }

        Some(Permit {
            breaker: self,
            generation: state.generation,
            settled: false,
        })
    }

    fn release(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation == generation
            && state.state == CircuitState::HalfOpen
            && state.half_open_admitted > 0
        {
            state.half_open_admitted -= 1;
        }
    }

    fn on_success(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            return;
        }

        match state.state {
            CircuitState::Closed => self.record(&mut state, false),
            CircuitState::HalfOpen => {
                state.half_open_successes += 1;
                if state.half_open_successes >= self.config.permitted_calls_in_half_open_state {
                    self.transition(&mut state, CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            return;
        }

        match state.state {
            CircuitState::Closed => {
                self.record(&mut state, true);
                let rate = state.failure_rate().unwrap_or(0.0);
                if state.window.len() >= self.config.minimum_number_of_calls
                    && rate >= self.config.failure_rate_threshold
                {
                    tracing::warn!(
                        breaker = %self.name,
                        failure_rate = rate,
                        threshold = self.config.failure_rate_threshold,
                        "failure rate crossed threshold"
                    );
                    self.transition(&mut state, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(breaker = %self.name, "trial call failed while half-open");
                self.transition(&mut state, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    fn record(&self, state: &mut BreakerState, failed: bool) {
        state.window.push_back(failed);
        while state.window.len() > self.config.sliding_window_size {
            state.window.pop_front();
        }
    }

    fn transition(&self, state: &mut BreakerState, to: CircuitState) {
        let from = state.state;
        state.state = to;
        state.generation += 1;
        state.window.clear();
        state.half_open_admitted = 0;
        state.half_open_successes = 0;
        state.opened_at = (to == CircuitState::Open).then(Instant::now);

        if from != to {
            tracing::info!(breaker = %self.name, %from, %to, "circuit breaker state change");
            metrics::counter!(
                "circuit_breaker_transitions_total",
                "breaker" => self.name.to_string(),
                "to" => to.as_str()
            )
            .increment(1);
        }
        metrics::gauge!("circuit_breaker_state", "breaker" => self.name.to_string())
            .set(to.gauge_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn config(window: usize, wait: Duration, half_open: usize) -> CircuitBreakerConfig {
        CircuitBreakerConfig::builder()
            .failure_rate_threshold(50.0)
            .sliding_window_size(window)
            .minimum_number_of_calls(window)
            .wait_duration_in_open_state(wait)
            .permitted_calls_in_half_open_state(half_open)
            .build()
    }

    async fn fail(breaker: &CircuitBreaker) {
        let _ = breaker.call(|| async { Err::<(), _>("error") }).await;
    }

    async fn succeed(breaker: &CircuitBreaker) {
        let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;
    }

    #[tokio::test]
    async fn test_closed_on_success() {
        let breaker = CircuitBreaker::new("test", CircuitBreakerConfig::default());

        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;

        assert_eq!(result, Ok(42));
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_stays_closed_below_minimum_calls() {
        let breaker = CircuitBreaker::new("test", config(4, Duration::from_secs(1), 1));

        for _ in 0..3 {
            fail(&breaker).await;
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_rate(), Some(100.0));
    }

    #[tokio::test]
    async fn test_opens_when_rate_reaches_threshold() {
        let breaker = CircuitBreaker::new("test", config(4, Duration::from_secs(1), 1));

        succeed(&breaker).await;
        succeed(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);

        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_window_slides() {
        let breaker = CircuitBreaker::new("test", config(4, Duration::from_secs(1), 1));

        // Old failures fall out of the window before the rate is reached.
        fail(&breaker).await;
        for _ in 0..4 {
            succeed(&breaker).await;
        }
        fail(&breaker).await;

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_rate(), Some(25.0));
    }

    #[tokio::test]
    async fn test_rejects_without_running_when_open() {
        let breaker = CircuitBreaker::new("test", config(2, Duration::from_secs(60), 1));
        fail(&breaker).await;
        fail(&breaker).await;

        let ran = AtomicUsize::new(0);
        let result = breaker
            .call(|| async {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            })
            .await;

        assert_eq!(result, Err(CircuitBreakerError::Open));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.metrics().rejections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_wait() {
        let breaker = CircuitBreaker::new("test", config(2, Duration::from_secs(5), 2));
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(matches!(
            breaker.call(|| async { Ok::<_, ()>(()) }).await,
            Err(CircuitBreakerError::Open)
        ));

        tokio::time::advance(Duration::from_secs(1)).await;
        succeed(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closes_after_trial_successes() {
        let breaker = CircuitBreaker::new("test", config(2, Duration::from_secs(5), 2));
        fail(&breaker).await;
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        succeed(&breaker).await;
        succeed(&breaker).await;

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_rate(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopens_on_trial_failure() {
        let breaker = CircuitBreaker::new("test", config(2, Duration::from_secs(5), 3));
        fail(&breaker).await;
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        succeed(&breaker).await;
        fail(&breaker).await;

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_limits_trial_calls() {
        let breaker = CircuitBreaker::new("test", config(1, Duration::from_secs(5), 1));
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let trial_breaker = breaker.clone();
        let trial = tokio::spawn(async move {
            trial_breaker
                .call(|| async {
                    let _ = release_rx.await;
                    Ok::<_, ()>(())
                })
                .await
        });
        tokio::task::yield_now().await;

        // The single trial slot is taken.
        assert!(matches!(
            breaker.call(|| async { Ok::<_, ()>(()) }).await,
            Err(CircuitBreakerError::Open)
        ));

        release_tx.send(()).unwrap();
        assert!(trial.await.unwrap().is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_frees_its_slot() {
        let breaker = CircuitBreaker::new("test", config(1, Duration::from_secs(5), 1));
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            breaker.call(|| async {
                std::future::pending::<()>().await;
                Ok::<_, ()>(())
            }),
        )
        .await;
        assert!(abandoned.is_err());

        succeed(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_late_outcome_from_old_generation_is_ignored() {
        let breaker = CircuitBreaker::new("test", config(2, Duration::from_secs(60), 1));

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let slow_breaker = breaker.clone();
        let slow = tokio::spawn(async move {
            slow_breaker
                .call(|| async {
                    let _ = release_rx.await;
                    Err::<(), _>("late failure")
                })
                .await
        });
        tokio::task::yield_now().await;

        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        breaker.reset();

        release_tx.send(()).unwrap();
        let _ = slow.await.unwrap();

        assert_eq!(breaker.failure_rate(), None);
        assert_eq!(breaker.metrics().failures, 3);
    }

    #[tokio::test]
    async fn test_metrics() {
        let breaker = CircuitBreaker::new("test", config(10, Duration::from_secs(1), 1));

        for _ in 0..3 {
            succeed(&breaker).await;
        }
        for _ in 0..2 {
            fail(&breaker).await;
        }

        assert_eq!(
            breaker.metrics(),
            CircuitBreakerMetrics {
                calls: 5,
                successes: 3,
                failures: 2,
                rejections: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_reset() {
        let breaker = CircuitBreaker::new("test", config(2, Duration::from_secs(60), 1));
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_outcomes_are_counted_once() {
        let breaker = CircuitBreaker::new("test", config(1000, Duration::from_secs(60), 1));

        let mut handles = vec![];
        for i in 0..200 {
            let breaker = breaker.clone();
            handles.push(tokio::spawn(async move {
                let _ = breaker
                    .call(|| async move {
                        tokio::task::yield_now().await;
                        if i % 4 == 0 { Err("error") } else { Ok(()) }
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let metrics = breaker.metrics();
        assert_eq!(metrics.calls, 200);
        assert_eq!(metrics.failures, 50);
        assert_eq!(metrics.successes, 150);
        assert_eq!(breaker.failure_rate(), Some(25.0));
    }

    #[test]
    fn test_config_is_sanitized() {
        let config = CircuitBreakerConfig::builder()
            .sliding_window_size(0)
            .minimum_number_of_calls(10)
            .permitted_calls_in_half_open_state(0)
            .failure_rate_threshold(250.0)
            .build();

        assert_eq!(config.sliding_window_size, 1);
        assert_eq!(config.minimum_number_of_calls, 1);
        assert_eq!(config.permitted_calls_in_half_open_state, 1);
        assert_eq!(config.failure_rate_threshold, 100.0);
    }
}
