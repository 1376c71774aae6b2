//! `FlowController`: a counting admission primitive (§4.3).

use tokio::sync::Semaphore;

use crate::context::Context;

/// A bounded-concurrency admission gate. `max` is clamped to ≥1.
pub struct FlowController {
    semaphore: Semaphore,
    capacity: usize,
}

impl FlowController {
    /// Build a controller admitting at most `max_concurrency` holders
    /// at once.
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        let capacity = max_concurrency.max(1);
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Block until a slot is free or `ctx` cancels. Returns `false` if
    /// cancellation won the race.
    pub async fn acquire(&self, ctx: &Context) -> bool {
        tokio::select! {
            permit = self.semaphore.acquire() => {
                permit.expect("semaphore is never closed").forget();
                true
            }
            () = ctx.cancelled() => false,
        }
    }

    /// Non-blocking acquire attempt.
    pub fn try_acquire(&self) -> bool {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Release a slot. A no-op if releasing would exceed the
    /// original capacity, so misuse can't panic.
    pub fn release(&self) {
        if self.semaphore.available_permits() < self.capacity() {
            self.semaphore.add_permits(1);
        }
    }

    /// The configured capacity (clamped `max_concurrency`).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
