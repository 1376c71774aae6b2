//! The event stream fabric (C6): typed, pull-based event sequences
//! with lazy transformation, merging, fan-out, bounded buffering, and
//! explicit backpressure.

mod buffered;
mod fan_out;
mod flow_controller;
mod merge;

pub use buffered::BufferedStream;
pub use fan_out::fan_out;
pub use flow_controller::FlowController;
pub use merge::merge;

use std::pin::Pin;

use futures::{Stream as FuturesStream, StreamExt};

use crate::error::Error;
use crate::event::Event;

/// A boxed, `Send` stream of [`Event`]s — the consumer-facing alias
/// used throughout the fabric.
pub type Stream<T> = Pin<Box<dyn FuturesStream<Item = Event<T>> + Send>>;

/// Drain a stream into a vector plus the first error observed.
/// Events seen before a failure are retained (§4.3).
pub async fn collect<T>(mut stream: Stream<T>) -> (Vec<Event<T>>, Option<Error>) {
    let mut events = Vec::new();
    let mut first_error = None;
    while let Some(event) = stream.next().await {
        let is_error = event.error_ref().is_some();
        if is_error {
            first_error = event.into_parts().1;
            break;
        }
        events.push(event);
    }
    (events, first_error)
}

/// Lazily transform each non-error event via `f`. If `src` errors, the
/// mapped stream yields that error and stops; if `f` errors on an
/// event, same behavior — either way no further events are pulled
/// from `src` afterwards (§4.3, P5).
pub fn map<T, U, F>(mut src: Stream<T>, f: F) -> Stream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Result<U, Error> + Send + 'static,
{
    let mapped = async_stream::stream! {
        while let Some(event) = src.next().await {
            let kind = event.kind();
            let metadata = event.metadata().clone();
            let (payload, error) = event.into_parts();
            match error {
                Some(err) => {
                    yield Event::error(err);
                    break;
                }
                None => {
                    let payload = payload.expect("non-error event always carries a payload");
                    match f(payload) {
                        Ok(mapped) => {
                            let mut mapped_event = Event::new(kind, mapped);
                            for (k, v) in metadata {
                                mapped_event = mapped_event.with_metadata(k, v);
                            }
                            yield mapped_event;
                        }
                        Err(err) => {
                            yield Event::error(err);
                            break;
                        }
                    }
                }
            }
        }
    };
    Box::pin(mapped)
}

/// Lazily filter events by a predicate over the payload. Errors
/// always pass through.
pub fn filter<T, F>(src: Stream<T>, keep: F) -> Stream<T>
where
    T: Send + 'static,
    F: Fn(&T) -> bool + Send + 'static,
{
    let filtered = src.filter_map(move |event| {
        let keep_it = match event.payload() {
            Some(payload) => keep(payload),
            None => true,
        };
        futures::future::ready(if keep_it { Some(event) } else { None })
    });
    Box::pin(filtered)
}
