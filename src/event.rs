//! The event type yielded by a [`crate::stream::Stream`] (part of C6).

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::error::Error;

/// The kind of an [`Event`]. Closed, mirroring the event-kind set in
/// the data model: `data`, `tool-call`, `tool-result`, `handoff`,
/// `done`, `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An incremental payload chunk.
    Data,
    /// A request to invoke a tool.
    ToolCall,
    /// The result of a tool invocation.
    ToolResult,
    /// Control is being handed off to another component.
    Handoff,
    /// The stream is complete; no further events follow.
    Done,
    /// The stream terminated abnormally.
    Error,
}

/// One element of a [`crate::stream::Stream`].
///
/// Invariant: an `Error`-kind event always carries `Some` error; every
/// other kind always carries `None`. Constructors enforce this so an
/// `Event` can never be built in the invalid combination.
#[derive(Debug)]
pub struct Event<T> {
    kind: EventKind,
    payload: Option<T>,
    error: Option<Error>,
    metadata: HashMap<String, Json>,
}

impl<T> Event<T> {
    /// Build a non-error event of the given kind.
    pub fn new(kind: EventKind, payload: T) -> Self {
        debug_assert!(!matches!(kind, EventKind::Error), "use Event::error for error events");
        Self {
            kind,
            payload: Some(payload),
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Build the terminal error event for a stream.
    #[must_use]
    pub fn error(error: Error) -> Self {
        Self {
            kind: EventKind::Error,
            payload: None,
            error: Some(error),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry, e.g. `trace-id`, `latency-ms`,
    /// `token-count` (§6 conventions).
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Json) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// This event's kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The payload, if this isn't an error event.
    #[must_use]
    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    /// The wrapped error, if this is an error event.
    #[must_use]
    pub fn error_ref(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Metadata attached to this event.
    #[must_use]
    pub fn metadata(&self) -> &HashMap<String, Json> {
        &self.metadata
    }

    /// Decompose into the payload and error, consuming the event.
    #[must_use]
    pub fn into_parts(self) -> (Option<T>, Option<Error>) {
        (self.payload, self.error)
    }
}
