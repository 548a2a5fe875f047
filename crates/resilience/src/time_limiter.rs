//! Wall-clock cap on a single attempt.

use std::future::Future;
use std::time::Duration;

/// Caps how long one attempt may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLimiter {
    timeout: Duration,
}

impl TimeLimiter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `future`, turning expiry into the error built by `on_elapsed`.
    ///
    /// The future is dropped when the limit expires.
    pub async fn run<F, T, E>(
        &self,
        future: F,
        on_elapsed: impl FnOnce(Duration) -> E,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "attempt timed out"
                );
                Err(on_elapsed(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fast_future_passes_through() {
        let limiter = TimeLimiter::new(Duration::from_secs(1));
        let result: Result<u32, String> = limiter
            .run(async { Ok(7) }, |d| format!("timed out after {d:?}"))
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_future_is_cut_off() {
        let limiter = TimeLimiter::new(Duration::from_millis(100));
        let started = tokio::time::Instant::now();

        let result: Result<u32, Duration> = limiter
            .run(
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(7)
                },
                |d| d,
            )
            .await;

        assert_eq!(result, Err(Duration::from_millis(100)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_error_is_kept() {
        let limiter = TimeLimiter::new(Duration::from_secs(1));
        let result: Result<u32, &str> = limiter.run(async { Err("boom") }, |_| "timeout").await;
        assert_eq!(result, Err("boom"));
    }
}
