//! Retry/backoff (C9): a concrete, optional retrying decorator over a
//! fallible async operation, driven by [`RetryPolicy`] (§4.7).
//!
//! Entirely opt-in — the batch engine and stream fabric never call
//! this implicitly.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::context::Context;
use crate::error::Error;

/// Backoff schedule and retry budget for [`with_retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    factor: f64,
    jitter: bool,
}

impl RetryPolicy {
    /// A policy with one attempt, no retries — the permissive
    /// default before `with_*` calls narrow it.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            factor: 2.0,
            jitter: true,
        }
    }

    /// Total attempts including the first, so `1` disables retrying.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// The delay before the second attempt.
    #[must_use]
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// The ceiling every computed delay is capped at.
    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// The multiplicative growth factor applied per attempt.
    #[must_use]
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Whether to jitter each computed delay uniformly over `[0, delay)`.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_backoff.as_secs_f64() * self.factor.powi(attempt as i32 - 1);
        let capped = scaled.min(self.max_backoff.as_secs_f64()).max(0.0);
        let delay = Duration::from_secs_f64(capped);
        if self.jitter {
            jitter(delay)
        } else {
            delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// A cheap, dependency-free jitter source: the current time's
/// sub-second nanoseconds modulo the delay, uniform enough for
/// backoff spreading without pulling in a `rand` dependency nothing
/// else in this codebase uses.
fn jitter(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let delay_nanos = delay.as_nanos().max(1);
    let jittered = (nanos as u128) % delay_nanos;
    Duration::from_nanos(jittered as u64)
}

/// Run `op` under `policy`, retrying while the observed error is
/// retryable (§7) and attempts remain, aborting early if `ctx`
/// cancels.
pub async fn with_retry<T, F, Fut>(ctx: &Context, policy: &RetryPolicy, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !err.is_retryable() || ctx.is_cancelled() {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, kind = %err.kind(), "retrying after error");
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = ctx.cancelled() => return Err(err),
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let ctx = Context::new();
        let policy = RetryPolicy::new()
            .with_max_attempts(3)
            .with_initial_backoff(Duration::from_millis(1))
            .with_jitter(false);
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_for_closure = Arc::clone(&attempts);

        let result = with_retry(&ctx, &policy, move || {
            let attempts = Arc::clone(&attempts_for_closure);
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Error::new("op", ErrorKind::Timeout, "not yet"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_kind_aborts_immediately() {
        let ctx = Context::new();
        let policy = RetryPolicy::new().with_max_attempts(5);
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_for_closure = Arc::clone(&attempts);

        let result: Result<(), Error> = with_retry(&ctx, &policy, move || {
            let attempts = Arc::clone(&attempts_for_closure);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::new("op", ErrorKind::InvalidInput, "bad request"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_max_attempts_returns_last_error() {
        let ctx = Context::new();
        let policy = RetryPolicy::new()
            .with_max_attempts(2)
            .with_initial_backoff(Duration::from_millis(1));
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_for_closure = Arc::clone(&attempts);

        let result: Result<(), Error> = with_retry(&ctx, &policy, move || {
            let attempts = Arc::clone(&attempts_for_closure);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::new("op", ErrorKind::RateLimit, "throttled"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
