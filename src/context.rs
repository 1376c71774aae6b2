//! Ambient request context (C2): an immutable value carrier plus
//! cooperative cancellation, threaded through every core operation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

macro_rules! typed_id {
    ($name:ident) => {
        #[doc = concat!("A typed `", stringify!($name), "` string wrapper.")]
        #[doc = ""]
        #[doc = "Distinct newtypes keep independently introduced ids from"]
        #[doc = "colliding by accident at a call site."]
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            /// Wrap a string as this id type.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

typed_id!(TenantId);
typed_id!(SessionId);
typed_id!(RequestId);

#[derive(Debug, Clone, Default)]
struct Values {
    tenant: Option<TenantId>,
    session: Option<SessionId>,
    request: Option<RequestId>,
}

/// The ambient request context: an immutable carrier for the core's
/// recognised keys (tenant, session, request id) and the process's
/// cooperative cancellation signal.
///
/// Writing a key returns a derived context; the receiver is never
/// mutated in place (P11).
#[derive(Debug, Clone)]
pub struct Context {
    values: Arc<Values>,
    cancellation: CancellationToken,
}

impl Context {
    /// A fresh root context with no recognised keys set, carrying its
    /// own independent cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Arc::new(Values::default()),
            cancellation: CancellationToken::new(),
        }
    }

    /// Derive a child context carrying the given tenant id. The
    /// parent is unaffected.
    #[must_use]
    pub fn with_tenant(&self, tenant: impl Into<TenantId>) -> Self {
        let mut values = (*self.values).clone();
        values.tenant = Some(tenant.into());
        Self {
            values: Arc::new(values),
            cancellation: self.cancellation.clone(),
        }
    }

    /// Derive a child context carrying the given session id.
    #[must_use]
    pub fn with_session(&self, session: impl Into<SessionId>) -> Self {
        let mut values = (*self.values).clone();
        values.session = Some(session.into());
        Self {
            values: Arc::new(values),
            cancellation: self.cancellation.clone(),
        }
    }

    /// Derive a child context carrying the given request id.
    #[must_use]
    pub fn with_request(&self, request: impl Into<RequestId>) -> Self {
        let mut values = (*self.values).clone();
        values.request = Some(request.into());
        Self {
            values: Arc::new(values),
            cancellation: self.cancellation.clone(),
        }
    }

    /// The tenant id, if any was set on this context or an ancestor.
    #[must_use]
    pub fn tenant(&self) -> Option<&TenantId> {
        self.values.tenant.as_ref()
    }

    /// The session id, if any was set on this context or an ancestor.
    #[must_use]
    pub fn session(&self) -> Option<&SessionId> {
        self.values.session.as_ref()
    }

    /// The request id, if any was set on this context or an ancestor.
    #[must_use]
    pub fn request(&self) -> Option<&RequestId> {
        self.values.request.as_ref()
    }

    /// Derive a child whose cancellation token fires when either this
    /// context cancels or it is cancelled directly. The child's
    /// cancellation never propagates back up to this context.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
            cancellation: self.cancellation.child_token(),
        }
    }

    /// Derive a child that also cancels after `timeout` elapses,
    /// whichever comes first. Used by the batch engine's per-item
    /// timeout.
    #[must_use]
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let child = self.child();
        let token = child.cancellation.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => token.cancel(),
                () = token.cancelled() => {}
            }
        });
        child
    }

    /// Whether this context (or an ancestor) has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Resolve once this context is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_derive_without_mutating_parent() {
        let root = Context::new();
        let child = root.with_tenant("acme").with_session("s-1");

        assert!(root.tenant().is_none());
        assert!(root.session().is_none());
        assert_eq!(child.tenant().map(TenantId::as_str), Some("acme"));
        assert_eq!(child.session().map(SessionId::as_str), Some("s-1"));
    }

    #[test]
    fn child_inherits_parent_values() {
        let root = Context::new().with_request("r-1");
        let child = root.child().with_tenant("acme");
        assert_eq!(child.request().map(RequestId::as_str), Some("r-1"));
        assert_eq!(child.tenant().map(TenantId::as_str), Some("acme"));
    }

    #[tokio::test]
    async fn child_cancellation_does_not_propagate_to_parent() {
        let root = Context::new();
        let child = root.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn parent_cancellation_propagates_to_child() {
        let root = Context::new();
        let child = root.child();
        root.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn timeout_child_cancels_on_deadline() {
        let root = Context::new();
        let child = root.child_with_timeout(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }
}
