//! The application lifecycle manager (C8): ordered start-up with
//! rollback on partial failure, reverse-order shutdown with error
//! aggregation, and aggregated health reporting.

use std::time::SystemTime;

use async_trait::async_trait;
use tracing::{error, info_span, Instrument};

use crate::context::Context;
use crate::error::Error;

/// A component's self-reported health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Fully operational.
    Healthy,
    /// Operational but impaired.
    Degraded,
    /// Not operational.
    Unhealthy,
}

/// A point-in-time health snapshot.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    state: HealthState,
    message: String,
    timestamp: SystemTime,
}

impl HealthStatus {
    /// Build a health status, stamped with the current time.
    #[must_use]
    pub fn new(state: HealthState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            timestamp: SystemTime::now(),
        }
    }

    /// The reported state.
    #[must_use]
    pub fn state(&self) -> HealthState {
        self.state
    }

    /// When this status was captured.
    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// The accompanying message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A long-lived, lifecycle-managed unit: start, stop, and report
/// health. Implementations register with a [`LifecycleManager`]
/// before `start` is first called.
#[async_trait]
pub trait Component: Send + Sync {
    /// A short, stable name used in lifecycle tracing spans.
    fn name(&self) -> &str;

    /// Bring the component up.
    async fn start(&self, ctx: &Context) -> Result<(), Error>;

    /// Tear the component down. Called during rollback and during
    /// ordinary shutdown; implementations should be safe to call even
    /// if `start` never completed.
    async fn stop(&self, ctx: &Context) -> Result<(), Error>;

    /// Report current health.
    async fn health(&self) -> HealthStatus;
}

/// Aggregates every sub-failure observed during a `stop` call into one
/// composite error (§4.5, §7).
#[derive(Debug)]
pub struct ShutdownError {
    failures: Vec<(String, Error)>,
}

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} component(s) failed to stop: ", self.failures.len())?;
        let summary = self
            .failures
            .iter()
            .map(|(name, err)| format!("{name}: {err}"))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&summary)
    }
}

impl std::error::Error for ShutdownError {}

impl ShutdownError {
    /// The per-component failures that make up this aggregate, in the
    /// order they occurred (reverse registration order).
    #[must_use]
    pub fn failures(&self) -> &[(String, Error)] {
        &self.failures
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RunState {
    Configured,
    Running,
    Stopped,
}

/// Owns a registered set of [`Component`]s and drives their
/// coordinated start-up and shutdown (§4.5).
pub struct LifecycleManager {
    components: Vec<Box<dyn Component>>,
    state: RunState,
}

impl LifecycleManager {
    /// An empty manager with nothing registered yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            state: RunState::Configured,
        }
    }

    /// Register a component. Only valid before `start` is first
    /// called; registration order is the start order.
    pub fn register(&mut self, component: Box<dyn Component>) {
        self.components.push(component);
    }

    /// Start every registered component in registration order. On the
    /// first failure at index k, best-effort `stop` every component
    /// in `[0, k)` in reverse order and return the originating
    /// failure.
    pub async fn start(&mut self, ctx: &Context) -> Result<(), Error> {
        for (index, component) in self.components.iter().enumerate() {
            let span = info_span!("lifecycle.start", component = component.name(), index);
            let outcome = component.start(ctx).instrument(span).await;
            if let Err(err) = outcome {
                for rollback in self.components[..index].iter().rev() {
                    let span = info_span!("lifecycle.rollback", component = rollback.name());
                    async {
                        if let Err(rollback_err) = rollback.stop(ctx).await {
                            error!(component = rollback.name(), error = %rollback_err, "rollback stop failed");
                        }
                    }
                    .instrument(span)
                    .await;
                }
                return Err(err);
            }
        }
        self.state = RunState::Running;
        Ok(())
    }

    /// Stop every component in reverse registration order, continuing
    /// past individual failures. Idempotent: a no-op if not running.
    pub async fn stop(&mut self, ctx: &Context) -> Result<(), ShutdownError> {
        if self.state != RunState::Running {
            return Ok(());
        }

        let mut failures = Vec::new();
        for component in self.components.iter().rev() {
            let span = info_span!("lifecycle.stop", component = component.name());
            let outcome = component.stop(ctx).instrument(span).await;
            if let Err(err) = outcome {
                failures.push((component.name().to_string(), err));
            }
        }
        self.state = RunState::Stopped;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError { failures })
        }
    }

    /// Snapshot every component's health, in registration order.
    pub async fn health(&self) -> Vec<HealthStatus> {
        let mut statuses = Vec::with_capacity(self.components.len());
        for component in &self.components {
            statuses.push(component.health().await);
        }
        statuses
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
