//! `FanOut`: replicate a single stream to `n` independent consumers.

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::context::Context;
use crate::event::Event;

use super::Stream;

const CONSUMER_BUFFER: usize = 16;

/// Replicate `src` to `n` independent consumer streams. The producer
/// broadcasts each event to every consumer channel; a slow consumer
/// throttles all others since the producer blocks on the slowest.
/// Error events are broadcast, then the producer stops. Cancelling
/// `ctx` aborts the producer and closes every consumer channel.
pub fn fan_out<T>(ctx: Context, mut src: Stream<T>, n: usize) -> Vec<Stream<T>>
where
    T: Clone + Send + 'static,
{
    let n = n.max(1);
    let mut senders = Vec::with_capacity(n);
    let mut receivers = Vec::with_capacity(n);
    for _ in 0..n {
        let (tx, rx) = mpsc::channel(CONSUMER_BUFFER);
        senders.push(tx);
        receivers.push(rx);
    }

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = ctx.cancelled() => break,
                next = src.next() => {
                    match next {
                        Some(event) => {
                            let is_error = event.error_ref().is_some();
                            for tx in &senders {
                                if tx.send(clone_event(&event)).await.is_err() {
                                    continue;
                                }
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

    receivers
        .into_iter()
        .map(|mut rx| {
            let stream = async_stream::stream! {
                while let Some(event) = rx.recv().await {
                    yield event;
                }
            };
            Box::pin(stream) as Stream<T>
        })
        .collect()
}

fn clone_event<T: Clone>(event: &Event<T>) -> Event<T> {
    match (event.kind(), event.payload(), event.error_ref()) {
        (kind, Some(payload), None) => {
            let mut cloned = Event::new(kind, payload.clone());
            for (k, v) in event.metadata() {
                cloned = cloned.with_metadata(k.clone(), v.clone());
            }
            cloned
        }
        (_, _, Some(err)) => Event::error(crate::error::Error::new(
            err.operation().to_string(),
            err.kind(),
            err.message().to_string(),
        )),
        _ => unreachable!("event invariant: non-error events always carry a payload"),
    }
}
