//! `BufferedStream`: absorbs bursts from a fast producer into a
//! bounded internal queue so a slow consumer doesn't throttle it
//! directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::context::Context;
use crate::event::Event;

use super::Stream;

/// Wraps a producer stream with an internal bounded queue. A
/// background task drains `src` into the queue; `into_stream` drains
/// the queue for the consumer. Calling `into_stream` more than once is
/// a usage error, reported as an immediately-exhausted stream rather
/// than corrupting shared state.
pub struct BufferedStream<T> {
    rx: mpsc::Receiver<Event<T>>,
    tx: mpsc::Sender<Event<T>>,
    capacity: usize,
    taken: Arc<AtomicBool>,
}

impl<T> BufferedStream<T>
where
    T: Send + 'static,
{
    /// Build a buffered wrapper over `src` with the given queue
    /// capacity (clamped to ≥1).
    pub fn new(ctx: Context, mut src: Stream<T>, buf_size: usize) -> Self {
        let capacity = buf_size.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let producer_tx = tx.clone();
        tokio::spawn(async move {
            let tx = producer_tx;
            loop {
                tokio::select! {
                    () = ctx.cancelled() => break,
                    next = src.next() => {
                        match next {
                            Some(event) => {
                                let is_error = event.error_ref().is_some();
                                if tx.send(event).await.is_err() {
                                    break;
                                }
                                if is_error {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        });
        Self {
            rx,
            tx,
            capacity,
            taken: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The configured queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of events currently queued but not yet consumed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// Whether the queue is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the consumer-facing stream. Returns an already-exhausted
    /// stream on any call after the first.
    pub fn into_stream(mut self) -> Stream<T> {
        if self.taken.swap(true, Ordering::SeqCst) {
            return Box::pin(futures::stream::empty());
        }
        let stream = async_stream::stream! {
            while let Some(event) = self.rx.recv().await {
                yield event;
            }
        };
        Box::pin(stream)
    }
}
