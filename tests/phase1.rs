//! Acceptance tests for the core substrate's external surface.
//!
//! Tests cover:
//! - Trait object safety (Box<dyn Trait> / Arc<dyn Trait> is Send + Sync)
//! - Typed id conversions and context derivation
//! - The seed scenarios from the error/batch/lifecycle design notes

use agent_substrate::*;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Object Safety: Box<dyn Trait> compiles and is Send + Sync
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn _assert_send_sync<T: Send + Sync>() {}

#[test]
fn executable_is_object_safe_send_sync() {
    _assert_send_sync::<Box<dyn Executable>>();
}

#[test]
fn arc_executable_is_send_sync() {
    _assert_send_sync::<Arc<dyn Executable>>();
}

#[test]
fn component_is_object_safe_send_sync() {
    _assert_send_sync::<Box<dyn Component>>();
}

#[test]
fn arc_component_is_send_sync() {
    _assert_send_sync::<Arc<dyn Component>>();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typed ids and context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn typed_ids_round_trip_through_string_conversions() {
    let tenant: TenantId = "acme".into();
    assert_eq!(tenant.as_str(), "acme");
    assert_eq!(tenant.to_string(), "acme");

    let session: SessionId = String::from("s-1").into();
    assert_eq!(session.as_str(), "s-1");

    let request = RequestId::new("r-1");
    assert_eq!(request.as_str(), "r-1");
}

#[test]
fn context_writes_derive_rather_than_mutate() {
    let root = Context::new();
    let child = root.with_tenant("acme").with_session("s-1").with_request("r-1");

    assert!(root.tenant().is_none());
    assert_eq!(child.tenant().unwrap().as_str(), "acme");
    assert_eq!(child.session().unwrap().as_str(), "s-1");
    assert_eq!(child.request().unwrap().as_str(), "r-1");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Seed scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Double;

#[async_trait::async_trait]
impl Executable for Double {
    async fn invoke(&self, _ctx: &Context, input: Value, _opts: &[Option_]) -> Result<Value, Error> {
        match input {
            Value::Json(serde_json::Value::Number(n)) => {
                let doubled = n.as_i64().unwrap_or(0) * 2;
                Ok(Value::Json(serde_json::json!(doubled)))
            }
            other => Err(Error::new("double.invoke", ErrorKind::InvalidInput, format!("unsupported: {}", other.variant_name()))),
        }
    }
}

#[tokio::test]
async fn ordered_batch_with_one_failing_item() {
    let ctx = Context::new();
    let inputs = vec![1, 2, 3];
    let results = run_batch(&ctx, inputs, &BatchOptions::new(), |_ctx, n: i32| async move {
        if n == 2 {
            Err(Error::new("item.run", ErrorKind::ToolFailed, "item 2 rejected"))
        } else {
            Ok(n * 10)
        }
    })
    .await;

    assert_eq!(results.len(), 3);
    assert_eq!(*results[0].output().unwrap(), 10);
    assert!(results[1].error().is_some());
    assert_eq!(*results[2].output().unwrap(), 30);
}

#[tokio::test]
async fn pipe_short_circuits_before_reaching_second_stage() {
    struct AlwaysFails;
    #[async_trait::async_trait]
    impl Executable for AlwaysFails {
        async fn invoke(&self, _ctx: &Context, _input: Value, _opts: &[Option_]) -> Result<Value, Error> {
            Err(Error::new("always-fails.invoke", ErrorKind::GuardBlocked, "blocked"))
        }
    }

    let pipe = Pipe::new(Box::new(AlwaysFails), Box::new(Double));
    let ctx = Context::new();
    let err = pipe
        .invoke(&ctx, Value::Json(serde_json::json!(1)), &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GuardBlocked);
}

#[tokio::test]
async fn parallel_invoke_over_heterogeneous_runnables() {
    let parallel = Parallel::new(vec![Box::new(Double), Box::new(Double)]);
    let ctx = Context::new();
    let out = parallel
        .invoke(&ctx, Value::Json(serde_json::json!(5)), &[])
        .await
        .unwrap();
    match out {
        Value::Json(serde_json::Value::Array(items)) => {
            assert_eq!(items, vec![serde_json::json!(10), serde_json::json!(10)]);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

struct FlakyThenHealthy {
    fail_first: std::sync::atomic::AtomicBool,
    name: &'static str,
}

#[async_trait::async_trait]
impl Component for FlakyThenHealthy {
    fn name(&self) -> &str {
        self.name
    }

    async fn start(&self, _ctx: &Context) -> Result<(), Error> {
        if self.fail_first.swap(false, std::sync::atomic::Ordering::SeqCst) {
            Err(Error::new("start", ErrorKind::ProviderUnavailable, "cold start failed"))
        } else {
            Ok(())
        }
    }

    async fn stop(&self, _ctx: &Context) -> Result<(), Error> {
        Ok(())
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::new(HealthState::Healthy, "ok")
    }
}

#[tokio::test]
async fn lifecycle_rolls_back_already_started_components_on_failure() {
    let stopped = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

    struct Tracking {
        name: &'static str,
        stopped: std::sync::Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    #[async_trait::async_trait]
    impl Component for Tracking {
        fn name(&self) -> &str {
            self.name
        }
        async fn start(&self, _ctx: &Context) -> Result<(), Error> {
            Ok(())
        }
        async fn stop(&self, _ctx: &Context) -> Result<(), Error> {
            self.stopped.lock().unwrap().push(self.name);
            Ok(())
        }
        async fn health(&self) -> HealthStatus {
            HealthStatus::new(HealthState::Healthy, "ok")
        }
    }

    let mut manager = LifecycleManager::new();
    manager.register(Box::new(Tracking { name: "db", stopped: Arc::clone(&stopped) }));
    manager.register(Box::new(Tracking { name: "cache", stopped: Arc::clone(&stopped) }));
    manager.register(Box::new(FlakyThenHealthy {
        fail_first: std::sync::atomic::AtomicBool::new(true),
        name: "provider",
    }));

    let ctx = Context::new();
    let err = manager.start(&ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
    assert_eq!(*stopped.lock().unwrap(), vec!["cache", "db"]);
}
