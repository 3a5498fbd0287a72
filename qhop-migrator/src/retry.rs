use qhop_core::{BrokerError, BrokerOp, DrainError, MigrationError};
use rand::{rng, Rng};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;

/// Bounded retry of transient broker errors with backoff and jitter.
///
/// Only [`BrokerError::is_transient`] errors are retried; everything else
/// surfaces on the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_backoff_ms: u64,
    max_backoff_ms: u64,
}

/// A drain that gave up, with every message it moved across all attempts.
#[derive(Debug)]
pub struct DrainFailure {
    pub moved: u64,
    pub error: MigrationError,
}

impl RetryPolicy {
    /// A zero backoff falls back to the defaults (300ms base, 5s cap);
    /// `max_retries = 0` disables retrying.
    pub fn new(max_retries: u32, base_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            base_backoff_ms: if base_backoff_ms == 0 {
                300
            } else {
                base_backoff_ms
            },
            max_backoff_ms: if max_backoff_ms == 0 {
                5_000
            } else {
                max_backoff_ms
            },
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.base_backoff_ms,
            config.max_backoff_ms,
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Calculate linear backoff with jitter
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        // Linear backoff: base * (attempt + 1), capped at max
        let linear = self.base_backoff_ms.saturating_mul(u64::from(attempt) + 1);
        let backoff = linear.min(self.max_backoff_ms);
        let jitter = rng().random_range(backoff / 2..=backoff); // 50-100% jitter
        Duration::from_millis(jitter)
    }

    fn should_retry(&self, error: &BrokerError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_retries
    }

    /// Runs `call` until it succeeds, fails permanently, or the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, op: BrokerOp, queue: &str, mut call: F) -> Result<T, MigrationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BrokerError>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if self.should_retry(&error, attempt) => {
                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        %op,
                        queue,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "transient broker error, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(escalate(error, attempt + 1)),
            }
        }
    }

    /// Like [`RetryPolicy::run`] for drains: each retry resumes with whatever is
    /// left on the source, and the moved counts of all attempts are summed.
    ///
    /// A stream source keeps its messages and a new drain reads it from the
    /// first offset again, so with `resumable == false` a drain that already
    /// moved messages is not retried.
    pub async fn run_drain<F, Fut>(
        &self,
        queue: &str,
        resumable: bool,
        mut call: F,
    ) -> Result<u64, DrainFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<u64, DrainError>>,
    {
        let mut attempt = 0u32;
        let mut moved = 0u64;
        loop {
            match call().await {
                Ok(n) => return Ok(moved + n),
                Err(DrainError { moved: n, error }) => {
                    moved += n;
                    if (resumable || moved == 0) && self.should_retry(&error, attempt) {
                        let backoff = self.calculate_backoff(attempt);
                        warn!(
                            op = %BrokerOp::Drain,
                            queue,
                            moved,
                            attempt = attempt + 1,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %error,
                            "drain interrupted, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    } else {
                        return Err(DrainFailure {
                            moved,
                            error: escalate(error, attempt + 1),
                        });
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

fn escalate(error: BrokerError, attempts: u32) -> MigrationError {
    match error {
        BrokerError::Transient(message) => MigrationError::TransientBroker { message, attempts },
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::RetryPolicy;
    use qhop_core::{BrokerError, BrokerOp, DrainError, MigrationError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, 1, 2)
    }

    #[test]
    fn backoff_is_linear_capped_and_jittered() {
        let policy = RetryPolicy::new(3, 100, 250);
        for attempt in 0..5 {
            let ms = policy.calculate_backoff(attempt).as_millis() as u64;
            let ceiling = (100 * (u64::from(attempt) + 1)).min(250);
            assert!(ms >= ceiling / 2 && ms <= ceiling, "attempt {attempt}: {ms}ms");
        }
    }

    #[test]
    fn zero_backoff_falls_back_to_defaults() {
        let policy = RetryPolicy::new(0, 0, 0);
        assert_eq!(policy.max_retries(), 0);
        let ms = policy.calculate_backoff(100).as_millis() as u64;
        assert!(ms >= 2_500 && ms <= 5_000);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let value = fast(3)
            .run(BrokerOp::Get, "orders", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(BrokerError::Transient("503".into()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_attempts() {
        let err = fast(2)
            .run(BrokerOp::Create, "orders", || async {
                Err::<(), _>(BrokerError::Transient("timeout".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrationError::TransientBroker { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = fast(5)
            .run(BrokerOp::Get, "orders", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(BrokerError::NotFound("orders".into())) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drain_retries_accumulate_moved_counts() {
        let calls = AtomicU32::new(0);
        let moved = fast(3)
            .run_drain("orders", true, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(DrainError::new(4, BrokerError::Transient("reset".into())))
                    } else {
                        Ok(6)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(moved, 10);
    }

    #[tokio::test]
    async fn failed_drain_keeps_partial_count() {
        let failure = fast(1)
            .run_drain("orders", true, || async {
                Err(DrainError::new(2, BrokerError::Transient("reset".into())))
            })
            .await
            .unwrap_err();
        assert_eq!(failure.moved, 4);
        assert_eq!(failure.error.attempts(), 2);
    }

    #[tokio::test]
    async fn stream_drain_is_not_replayed_after_progress() {
        let calls = AtomicU32::new(0);
        let failure = fast(3)
            .run_drain("events_temp_migrated", false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DrainError::new(3, BrokerError::Transient("reset".into()))) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(failure.moved, 3);
        assert_eq!(failure.error.attempts(), 1);
    }

    #[tokio::test]
    async fn stream_drain_retries_while_nothing_moved() {
        let calls = AtomicU32::new(0);
        let moved = fast(3)
            .run_drain("events_temp_migrated", false, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(DrainError::new(0, BrokerError::Transient("reset".into())))
                    } else {
                        Ok(5)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(moved, 5);
    }
}
