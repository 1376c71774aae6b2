//! The batch invocation engine (C7): index-preserving concurrent
//! execution with a concurrency cap, per-item timeout, and
//! cancellation propagation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{instrument, Span};

use crate::context::Context;
use crate::error::{Error, ErrorKind};

/// Recognised batch options (§3): concurrency cap, per-item timeout,
/// and an optional retry policy applied by `fn` itself, not the
/// engine (§4.4).
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    max_concurrency: Option<usize>,
    per_item_timeout: Option<Duration>,
}

impl BatchOptions {
    /// A fresh, unbounded, untimed options set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of items in flight at once. `0` is treated as
    /// unbounded.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = if max_concurrency == 0 {
            None
        } else {
            Some(max_concurrency)
        };
        self
    }

    /// Bound each item's execution with a timeout. `Duration::ZERO`
    /// disables the timeout.
    #[must_use]
    pub fn with_per_item_timeout(mut self, timeout: Duration) -> Self {
        self.per_item_timeout = if timeout.is_zero() { None } else { Some(timeout) };
        self
    }
}

/// One input's outcome: its output or an error, never both.
#[derive(Debug)]
pub struct BatchResult<O> {
    output: Option<O>,
    error: Option<Error>,
}

impl<O> BatchResult<O> {
    fn ok(output: O) -> Self {
        Self {
            output: Some(output),
            error: None,
        }
    }

    fn err(error: Error) -> Self {
        Self {
            output: None,
            error: Some(error),
        }
    }

    /// The output, if this item succeeded.
    #[must_use]
    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    /// The error, if this item failed.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Decompose into a `Result`, consuming the batch result.
    pub fn into_result(self) -> Result<O, Error> {
        match (self.output, self.error) {
            (Some(output), None) => Ok(output),
            (None, Some(error)) => Err(error),
            _ => unreachable!("BatchResult invariant: exactly one of output/error is set"),
        }
    }
}

/// Run `f` over every input concurrently, respecting `opts`'s
/// concurrency cap and per-item timeout, preserving index
/// correspondence between `inputs` and the returned vector (§4.4).
#[instrument(skip_all, fields(batch.len = inputs.len()))]
pub async fn run_batch<I, O, F, Fut>(ctx: &Context, inputs: Vec<I>, opts: &BatchOptions, f: F) -> Vec<BatchResult<O>>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(Context, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, Error>> + Send + 'static,
{
    let n = inputs.len();
    let mut results: Vec<Option<BatchResult<O>>> = (0..n).map(|_| None).collect();
    let semaphore = opts.max_concurrency.map(|cap| Arc::new(Semaphore::new(cap)));
    let f = Arc::new(f);

    let mut handles = Vec::with_capacity(n);
    let mut inputs = inputs.into_iter().enumerate();
    for (index, input) in &mut inputs {
        if ctx.is_cancelled() {
            results[index] = Some(BatchResult::err(cancellation_error(index)));
            break;
        }

        let permit = match &semaphore {
            Some(sem) => {
                tokio::select! {
                    permit = sem.clone().acquire_owned() => Some(permit.expect("semaphore never closed")),
                    () = ctx.cancelled() => None,
                }
            }
            None => None,
        };

        if semaphore.is_some() && permit.is_none() {
            results[index] = Some(BatchResult::err(cancellation_error(index)));
            break;
        }

        let item_ctx = match opts.per_item_timeout {
            Some(timeout) => ctx.child_with_timeout(timeout),
            None => ctx.child(),
        };
        let f = Arc::clone(&f);
        let span = Span::current();
        handles.push((
            index,
            tokio::spawn(async move {
                let _entered = span.enter();
                let outcome = f(item_ctx, input).await;
                drop(permit);
                outcome
            }),
        ));
    }

    for (index, handle) in handles {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(Error::new(
                "batch.run",
                ErrorKind::ToolFailed,
                format!("item task panicked: {join_err}"),
            )),
        };
        results[index] = Some(match outcome {
            Ok(output) => BatchResult::ok(output),
            Err(err) => BatchResult::err(err),
        });
    }

    results
        .into_iter()
        .enumerate()
        .map(|(index, result)| {
            result.unwrap_or_else(|| BatchResult::err(cancellation_error(index)))
        })
        .collect()
}

fn cancellation_error(index: usize) -> Error {
    Error::new(
        "batch.run",
        ErrorKind::Timeout,
        format!("item {index} not dispatched: context cancelled"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn result_length_and_index_correspondence() {
        let ctx = Context::new();
        let inputs = vec![1, 2, 3, 4];
        let results = run_batch(&ctx, inputs, &BatchOptions::new(), |_ctx, n: i32| async move {
            Ok::<_, Error>(n * 2)
        })
        .await;
        assert_eq!(results.len(), 4);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(*result.output().unwrap(), (i as i32 + 1) * 2);
        }
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let ctx = Context::new();
        let inputs: Vec<i32> = (0..8).collect();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));
        let opts = BatchOptions::new().with_max_concurrency(2);

        let in_flight_for_closure = Arc::clone(&in_flight);
        let max_observed_for_closure = Arc::clone(&max_observed);
        let results = run_batch(&ctx, inputs, &opts, move |_ctx, n: i32| {
            let in_flight = Arc::clone(&in_flight_for_closure);
            let max_observed = Arc::clone(&max_observed_for_closure);
            async move {
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_observed.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, Error>(n)
            }
        })
        .await;

        assert_eq!(results.len(), 8);
        assert!(max_observed.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn errors_are_recorded_per_item_without_failing_the_batch() {
        let ctx = Context::new();
        let inputs = vec![1, 2, 3];
        let results = run_batch(&ctx, inputs, &BatchOptions::new(), |_ctx, n: i32| async move {
            if n == 2 {
                Err(Error::new("item", ErrorKind::ToolFailed, "bad item"))
            } else {
                Ok(n)
            }
        })
        .await;
        assert!(results[0].output().is_some());
        assert!(results[1].error().is_some());
        assert!(results[2].output().is_some());
    }

    #[tokio::test]
    async fn cancellation_marks_undispatched_items() {
        let ctx = Context::new();
        ctx.cancel();
        let inputs = vec![1, 2, 3];
        let results = run_batch(&ctx, inputs, &BatchOptions::new(), |_ctx, n: i32| async move { Ok::<_, Error>(n) }).await;
        for result in &results {
            assert!(result.error().is_some());
        }
    }
}
