//! The structured error model (C1).
//!
//! One closed [`ErrorKind`] taxonomy is shared across every core
//! component. Downstream retry/backoff layers classify purely on
//! [`ErrorKind::is_retryable`] — nothing in the core special-cases a
//! particular operation's error.

use std::fmt;

/// A single error kind. Closed: no `Custom` escape hatch, because the
/// retryability classification in [`ErrorKind::is_retryable`] must stay
/// exhaustive over this set (spec P10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Upstream throttling.
    RateLimit,
    /// Auth/authorization failure.
    Auth,
    /// Deadline exceeded.
    Timeout,
    /// Malformed or missing input.
    InvalidInput,
    /// A downstream tool returned an error.
    ToolFailed,
    /// Upstream unreachable.
    ProviderUnavailable,
    /// Safety/policy layer rejection.
    GuardBlocked,
    /// Token/cost budget exceeded.
    BudgetExhausted,
}

impl ErrorKind {
    /// Whether a retry wrapper should retry an error of this kind.
    ///
    /// Retryable: `rate-limit`, `timeout`, `provider-unavailable`.
    /// Everything else is a caller or policy problem that retrying
    /// won't fix.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimit | ErrorKind::Timeout | ErrorKind::ProviderUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::RateLimit => "rate-limit",
            ErrorKind::Auth => "auth",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidInput => "invalid-input",
            ErrorKind::ToolFailed => "tool-failed",
            ErrorKind::ProviderUnavailable => "provider-unavailable",
            ErrorKind::GuardBlocked => "guard-blocked",
            ErrorKind::BudgetExhausted => "budget-exhausted",
        };
        f.write_str(s)
    }
}

/// A core error: an operation label, a kind, a message, and an
/// optional wrapped cause.
///
/// Constructed once at the failure site and propagated unchanged —
/// nothing in the core mutates an `Error` after creation. `Display`
/// and `std::error::Error` are implemented by hand below so the
/// rendered message can inline the cause's own rendering; the rest of
/// the codebase's error enums (see [`crate::lifecycle::LifecycleError`])
/// use `thiserror`'s derive directly.
#[derive(Debug)]
pub struct Error {
    operation: String,
    kind: ErrorKind,
    message: String,
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Construct a new error with no wrapped cause.
    pub fn new(operation: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach a wrapped cause, building the chain `is_a_kind` walks.
    #[must_use]
    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The operation label this error was constructed at.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// This error's own kind (not the chain).
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this error's own kind is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Walk this error and its cause chain, returning true if any
    /// frame carries the given kind.
    ///
    /// Only frames that are themselves an [`Error`] contribute a kind
    /// to the walk; an opaque wrapped cause (e.g. an I/O error) ends
    /// the classifiable chain without failing the query.
    #[must_use]
    pub fn is_a_kind(&self, kind: ErrorKind) -> bool {
        if self.kind == kind {
            return true;
        }
        match &self.cause {
            Some(cause) => match cause.downcast_ref::<Error>() {
                Some(inner) => inner.is_a_kind(kind),
                None => false,
            },
            None => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.operation, self.message, self.kind)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}
