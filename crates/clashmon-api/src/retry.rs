// Bounded retry with exponential backoff and jitter.
//
// Only transient failures (timeouts, broken connections) are retried.
// Authentication and client errors surface on the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::Error;

/// Exponential backoff policy for transient request failures.
///
/// `wait(n) = base * 2^(n-1) + uniform(0, ratio * base * 2^(n-1))`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Default: 3.
    pub max_attempts: u32,
    /// Wait after the first failed attempt. Default: 1s.
    pub base_delay: Duration,
    /// Upper bound of the random jitter, as a fraction of the wait. Default: 0.1.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter_ratio: 0.1,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before jitter, after the given 1-based failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp)
    }

    /// Backoff plus a uniformly random jitter in `[0, jitter_ratio * backoff]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        let jitter = backoff.mul_f64(self.jitter_ratio.max(0.0) * rand::random::<f64>());
        backoff + jitter
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `label` only feeds the debug log.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max => {
                    let delay = self.delay(attempt);
                    debug!(
                        request = label,
                        attempt,
                        max_attempts = max,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(request = label, attempt, error = %e, "giving up");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    fn counting_op(
        calls: &Arc<AtomicU32>,
        fail_times: u32,
        make_err: fn() -> Error,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, Error>> + Send>> {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { if n <= fail_times { Err(make_err()) } else { Ok(n) } })
        }
    }

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = RetryPolicy::default();
        for _ in 0..200 {
            let d = policy.delay(2);
            assert!(d >= Duration::from_secs(2));
            assert!(d <= Duration::from_millis(2200));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_timeouts_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = RetryPolicy::default()
            .run(
                "GET memory",
                counting_op(&calls, 2, || Error::Timeout { timeout_secs: 15 }),
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3), "waited {waited:?}");
        assert!(waited <= Duration::from_secs(6), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn connection_errors_exhaust_attempts() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = RetryPolicy::default()
            .run(
                "GET traffic",
                counting_op(&calls, 10, || Error::Connection {
                    message: "refused".into(),
                }),
            )
            .await;

        assert!(matches!(result, Err(Error::Connection { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_errors_fail_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = RetryPolicy::default()
            .run(
                "GET proxies",
                counting_op(&calls, 10, || Error::Authentication {
                    message: "bad token".into(),
                }),
            )
            .await;

        assert!(matches!(result, Err(Error::Authentication { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_fail_immediately() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = RetryPolicy::default()
            .run(
                "GET connections",
                counting_op(&calls, 10, || Error::Status {
                    status: 500,
                    message: "boom".into(),
                }),
            )
            .await;

        assert!(matches!(result, Err(Error::Status { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
