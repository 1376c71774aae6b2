//! Composition (C5): `Pipe` and `Parallel`, both `Executable`, so they
//! nest without the caller needing a different vocabulary at any
//! depth.

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Error;
use crate::event::{Event, EventKind};
use crate::executable::{EventStream, Executable, Value};
use crate::options::Option_;

/// `invoke` runs `a` then feeds its output to `b`, short-circuiting on
/// the first error. `stream` runs `a` to completion, then streams `b`
/// over the result.
pub struct Pipe {
    a: Box<dyn Executable>,
    b: Box<dyn Executable>,
}

impl Pipe {
    /// Build a pipe of two stages.
    pub fn new(a: Box<dyn Executable>, b: Box<dyn Executable>) -> Self {
        Self { a, b }
    }
}

#[async_trait]
impl Executable for Pipe {
    async fn invoke(&self, ctx: &Context, input: Value, opts: &[Option_]) -> Result<Value, Error> {
        let intermediate = self.a.invoke(ctx, input, opts).await?;
        self.b.invoke(ctx, intermediate, opts).await
    }

    async fn stream(&self, ctx: &Context, input: Value, opts: &[Option_]) -> EventStream<Value> {
        match self.a.invoke(ctx, input, opts).await {
            Ok(intermediate) => self.b.stream(ctx, intermediate, opts).await,
            Err(err) => Box::pin(futures::stream::once(async move { Event::error(err) })),
        }
    }
}

/// `invoke` fans out to every child with the same input, awaits all,
/// and returns the outputs in argument order. `stream` yields a single
/// event: the full output vector, then terminates.
pub struct Parallel {
    children: Vec<Box<dyn Executable>>,
}

impl Parallel {
    /// Build a fan-out over the given children.
    pub fn new(children: Vec<Box<dyn Executable>>) -> Self {
        Self { children }
    }
}

#[async_trait]
impl Executable for Parallel {
    async fn invoke(&self, ctx: &Context, input: Value, opts: &[Option_]) -> Result<Value, Error> {
        let futures = self
            .children
            .iter()
            .map(|child| child.invoke(ctx, input.clone(), opts));
        let results: Vec<Result<Value, Error>> = futures::future::join_all(futures).await;

        let mut first_error = None;
        let mut outputs = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(value) => outputs.push(Some(value)),
                Err(err) => {
                    outputs.push(None);
                    if first_error.is_none() {
                        first_error = Some((index, err));
                    }
                }
            }
        }

        if let Some((index, err)) = first_error {
            return Err(Error::new(
                "parallel.invoke",
                err.kind(),
                format!("child {index} failed: {}", err.message()),
            )
            .with_cause(err));
        }

        let json = outputs
            .into_iter()
            .map(|value| match value.expect("no error path leaves a None") {
                Value::Text(text) => serde_json::Value::String(text),
                Value::Messages(v) => serde_json::Value::Array(v),
                Value::Document(v) | Value::Json(v) => v,
                Value::Events(v) => serde_json::Value::Array(v),
            })
            .collect();
        Ok(Value::Json(serde_json::Value::Array(json)))
    }

    async fn stream(&self, ctx: &Context, input: Value, opts: &[Option_]) -> EventStream<Value> {
        let outcome = self.invoke(ctx, input, opts).await;
        Box::pin(futures::stream::once(async move {
            match outcome {
                Ok(value) => Event::new(EventKind::Data, value),
                Err(err) => Event::error(err),
            }
        }))
    }
}
