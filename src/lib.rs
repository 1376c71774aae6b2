//! # agent-substrate — the execution substrate for composable agentic AI systems
//!
//! This crate is not a provider integration, a tool registry, or an
//! orchestration DAG. It is the substrate those things run on: a
//! uniform invoke/stream contract every component satisfies, the
//! event stream fabric that contract's `stream` side produces, a
//! concurrent batch invocation engine, and an application lifecycle
//! manager — plus the structured error model and ambient
//! request-context machinery all four of those share.
//!
//! ## The Components
//!
//! | # | Module | What it does |
//! |---|--------|---------------|
//! | C1 | [`error`] | Closed error-kind taxonomy + retryability predicate |
//! | C2 | [`context`] | Request-scoped value + cancellation carrier |
//! | C3 | [`options`] | Type-erased functional options |
//! | C4 | [`executable`] | The `invoke`/`stream` capability pair |
//! | C5 | [`compose`] | Sequential pipe and parallel fan-out |
//! | C6 | [`stream`] | Typed events, lazy transforms, merge, fan-out, buffering |
//! | C7 | [`batch`] | Index-preserving concurrent batch invocation |
//! | C8 | [`lifecycle`] | Ordered start/stop with rollback and health aggregation |
//! | C9 | [`retry`] | Concrete retrying decorator driven by `RetryPolicy` |
//!
//! ## Design Principle
//!
//! Every trait here is operation-defined, not mechanism-defined.
//! [`executable::Executable::invoke`] means "run this unit once and
//! get its result" — not "call an HTTP endpoint" or "shell out to a
//! subprocess." That's what lets `Pipe`/`Parallel` compose a model, a
//! tool, and another pipeline without caring which is which.
//!
//! ## Dependency Notes
//!
//! This crate depends on `serde_json::Value` for open-ended payload
//! and metadata fields, `tokio` for its concurrency primitives
//! (channels, semaphores, spawned tasks), `tokio-util`'s
//! `CancellationToken` for the ambient context's cancellation signal,
//! and `tracing` for the span-per-operation instrumentation described
//! in [`lifecycle`] and [`batch`]. No metrics/collector backend is
//! bundled; host applications wire a `tracing-subscriber` of their
//! choice.

#![deny(missing_docs)]

pub mod batch;
pub mod compose;
pub mod context;
pub mod error;
pub mod event;
pub mod executable;
pub mod lifecycle;
pub mod options;
pub mod retry;
pub mod stream;

pub use batch::{run_batch, BatchOptions, BatchResult};
pub use compose::{Parallel, Pipe};
pub use context::{Context, RequestId, SessionId, TenantId};
pub use error::{Error, ErrorKind};
pub use event::{Event, EventKind};
pub use executable::{EventStream, Executable, Value};
pub use lifecycle::{Component, HealthState, HealthStatus, LifecycleManager, ShutdownError};
pub use options::{apply_all, Option_};
pub use retry::{with_retry, RetryPolicy};
pub use stream::{collect, fan_out, filter, map, merge, BufferedStream, FlowController, Stream};
