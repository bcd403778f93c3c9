use std::time::{Duration, Instant};

use bridge_registry::RetryableCategory;
use rand::Rng;
use tokio::time;
use tracing::debug;

/// Exponential backoff with jitter, doubling each attempt and capped at
/// `max_backoff` — the same doubling-and-cap shape as a subprocess spawn
/// retry, stretched out to second-scale delays for a whole invocation retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let doubled = self.base_backoff.saturating_mul(1u32 << exponent);
        let capped = doubled.min(self.max_backoff);
        let jitter_fraction: f64 = rand::thread_rng().gen_range(0.5..1.0);
        capped.mul_f64(jitter_fraction)
    }

    /// Whether `category` is one this command's spec allows the resilience
    /// layer to retry (spec §4.7: "typically transient I/O from the CLI
    /// binary", never a blanket retry-everything policy).
    pub fn is_retryable(retryable_categories: &[RetryableCategory], category: RetryableCategory) -> bool {
        retryable_categories.contains(&category)
    }

    /// Runs `attempt_fn` until it succeeds, a non-retryable failure occurs,
    /// attempts are exhausted, or `deadline` passes — whichever comes first.
    /// Retries never extend the invocation's original wall-clock budget.
    pub async fn run<T, E, F, Fut>(
        &self,
        deadline: Instant,
        retryable_categories: &[RetryableCategory],
        classify: impl Fn(&E) -> Option<RetryableCategory>,
        mut attempt_fn: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            let result = attempt_fn().await;
            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let category = classify(&error);
            let retryable = category
                .map(|cat| Self::is_retryable(retryable_categories, cat))
                .unwrap_or(false);

            attempt += 1;
            if !retryable || attempt >= self.max_attempts || Instant::now() >= deadline {
                return Err(error);
            }

            let backoff = self.backoff_for(attempt);
            let remaining = deadline.saturating_duration_since(Instant::now());
            let sleep_for = backoff.min(remaining);
            debug!(attempt, ?sleep_for, "retrying after transient failure");
            time::sleep(sleep_for).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_a_retryable_failure_until_it_succeeds() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        };
        let attempts = AtomicU32::new(0);
        let deadline = Instant::now() + Duration::from_secs(5);

        let result: Result<&str, &str> = policy
            .run(
                deadline,
                &[RetryableCategory::TransientIo],
                |_err: &&str| Some(RetryableCategory::TransientIo),
                || {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err("transient")
                        } else {
                            Ok("done")
                        }
                    }
                },
            )
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_a_non_retryable_category() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let deadline = Instant::now() + Duration::from_secs(5);

        let result: Result<&str, &str> = policy
            .run(
                deadline,
                &[RetryableCategory::TransientIo],
                |_err: &&str| Some(RetryableCategory::GeneralError),
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err("fatal") }
                },
            )
            .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
