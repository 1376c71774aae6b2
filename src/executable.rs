//! The Executable Contract (C4): the `invoke`/`stream` capability pair
//! every processable unit satisfies.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream as FuturesStream;
use serde_json::Value as Json;

use crate::context::Context;
use crate::error::Error;
use crate::event::Event;
use crate::options::Option_;

/// The small closed set of dynamically-typed values Executables
/// exchange, per §4.1: a tagged union rather than an open-ended `Any`.
#[derive(Debug, Clone)]
pub enum Value {
    /// Plain text.
    Text(String),
    /// A sequence of role-tagged messages, each a free-form JSON blob.
    Messages(Vec<Json>),
    /// A document payload (e.g. retrieved context).
    Document(Json),
    /// A vector of already-materialised events, used when composing
    /// over a drained stream.
    Events(Vec<Json>),
    /// An escape hatch for shapes not covered above.
    Json(Json),
}

impl Value {
    /// The variant name, used in `invalid-input` error messages.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Messages(_) => "messages",
            Value::Document(_) => "document",
            Value::Events(_) => "event-vector",
            Value::Json(_) => "json",
        }
    }
}

/// A boxed, send-able, pinned stream of [`Event`]s — the concrete type
/// behind [`crate::stream::Stream`], aliased here to keep
/// `Executable::stream`'s signature short.
pub type EventStream<T> = Pin<Box<dyn FuturesStream<Item = Event<T>> + Send>>;

/// Everything that can be invoked once or streamed: models, tools,
/// retrievers, and composed pipelines alike (§4.1).
///
/// Object-safe via `async-trait` so compositions (`Pipe`, `Parallel`)
/// can hold `Box<dyn Executable>` regardless of the concrete
/// implementation underneath.
#[async_trait]
pub trait Executable: Send + Sync {
    /// A single synchronous call: run to completion and return one
    /// output or one error.
    async fn invoke(
        &self,
        ctx: &Context,
        input: Value,
        opts: &[Option_],
    ) -> Result<Value, Error>;

    /// A lazy sequence of intermediate results. Draining a stream to
    /// completion and collapsing it must be observationally
    /// equivalent to calling `invoke` (§4.1's consistency contract);
    /// implementations that have no meaningful intermediate results
    /// may satisfy this with the default, which calls `invoke` once
    /// and yields a single `data` event carrying the call's
    /// `latency-ms` metadata (§6).
    async fn stream(
        &self,
        ctx: &Context,
        input: Value,
        opts: &[Option_],
    ) -> EventStream<Value> {
        let started = std::time::Instant::now();
        let result = self.invoke(ctx, input, opts).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        Box::pin(futures::stream::once(async move {
            match result {
                Ok(value) => {
                    let mut event = Event::new(crate::event::EventKind::Data, value);
                    for (key, metadata_value) in latency_metadata(latency_ms) {
                        event = event.with_metadata(key, metadata_value);
                    }
                    event
                }
                Err(err) => Event::error(err),
            }
        }))
    }
}

/// Build the `latency-ms` metadata entry recommended by §6
/// (non-normative), attached to the single event the default
/// `Executable::stream` implementation yields.
#[must_use]
pub fn latency_metadata(latency_ms: u64) -> HashMap<String, Json> {
    let mut map = HashMap::new();
    map.insert("latency-ms".to_string(), Json::from(latency_ms));
    map
}
