//! Gated execution pipeline: look up, authorize, run, record, forward.
//!
//! Every invocation that passes the availability and permission gates
//! produces exactly one execution record, which is forwarded to the
//! analytics sink and published to the broadcast hub regardless of how the
//! capability fared. Calls that fail either gate short-circuit before any
//! record exists, so observers never see half-born executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analytics::AnalyticsSink;
use crate::error::DispatchError;
use crate::events::BroadcastEvent;
use crate::hub::BroadcastHub;
use crate::permissions::{PermissionPolicy, PolicyAction};
use crate::tools::ToolRegistry;

/// Lifecycle of one execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Pending,
    Success,
    Error,
}

/// Per-invocation audit record. Owned by the dispatcher for the duration of
/// the call, then handed out by value; nobody shares mutable state with it
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: Uuid,
    pub name: String,
    pub args: Value,
    pub status: CallStatus,
    /// Success: the capability's return value. Error: a human-readable
    /// failure description.
    pub result: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
}

impl ToolCall {
    /// Fresh pending record with a newly generated id.
    pub fn pending(name: impl Into<String>, args: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            args,
            status: CallStatus::Pending,
            result: None,
            started_at: Utc::now(),
            duration_ms: None,
        }
    }

    /// Terminal transition: pending → success.
    pub fn finish_success(&mut self, result: Value, duration_ms: u64) {
        self.status = CallStatus::Success;
        self.result = Some(result);
        self.duration_ms = Some(duration_ms);
    }

    /// Terminal transition: pending → error.
    pub fn finish_error(&mut self, description: impl Into<String>, duration_ms: u64) {
        self.status = CallStatus::Error;
        self.result = Some(Value::String(description.into()));
        self.duration_ms = Some(duration_ms);
    }
}

/// Runs tools through the availability and permission gates and emits the
/// execution-record lifecycle.
pub struct ExecutionDispatcher {
    registry: Arc<ToolRegistry>,
    policy: Arc<dyn PermissionPolicy>,
    analytics: Arc<dyn AnalyticsSink>,
    hub: Arc<BroadcastHub>,
}

impl ExecutionDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy: Arc<dyn PermissionPolicy>,
        analytics: Arc<dyn AnalyticsSink>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            registry,
            policy,
            analytics,
            hub,
        }
    }

    /// Execute `name` with `args` on behalf of `role`.
    ///
    /// Returns the capability's result verbatim. A capability failure is
    /// re-raised to the caller unmasked, after the error-status record has
    /// been forwarded. Concurrent calls to the same tool are independent;
    /// no ordering or mutual exclusion is imposed here.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        role: &str,
    ) -> Result<Value, DispatchError> {
        debug!(tool = name, role, "dispatching tool call");

        // 1. Availability gate: unknown and disabled look identical.
        let tool = match self.registry.find(name) {
            Some((tool, true)) => tool,
            _ => {
                warn!(tool = name, "tool unavailable");
                return Err(DispatchError::ToolUnavailable(name.to_string()));
            }
        };

        // 2. Permission gate. No record exists yet, so a denial leaves no
        // trace in analytics or on the wire.
        if !self.policy.check(name, role, PolicyAction::Execute).await {
            warn!(tool = name, role, "execution denied");
            return Err(DispatchError::Unauthorized {
                tool: name.to_string(),
                role: role.to_string(),
            });
        }

        // 3. Pending record; from here on exactly one record is emitted.
        let mut record = ToolCall::pending(name, args.clone());
        let started = Instant::now();

        // 4. The one suspension point: the capability itself.
        let outcome = tool.execute(&args).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(value) => {
                record.finish_success(value.clone(), duration_ms);
                Ok(value)
            }
            Err(err) => {
                record.finish_error(err.to_string(), duration_ms);
                Err(DispatchError::Execution(err))
            }
        };

        // 5. Best-effort forwards, independent of each other and of the
        // outcome above.
        self.forward(record).await;

        result
    }

    /// Forward a finished record to the hub and the analytics sink. Neither
    /// failure may surface to the caller.
    async fn forward(&self, record: ToolCall) {
        self.hub.publish(&BroadcastEvent::tool_call(record.clone()));

        if let Err(err) = self.analytics.track_execution(record).await {
            warn!(error = %err, "analytics sink failed; execution outcome unaffected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MemorySink;
    use crate::error::{AnalyticsError, ToolError};
    use crate::permissions::RolePolicy;
    use crate::tools::{Tool, ToolParam};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTool {
        invocations: Arc<AtomicUsize>,
        outcome: Result<Value, String>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counting"
        }
        fn description(&self) -> &str {
            "records how often it runs"
        }
        fn parameters(&self) -> Vec<ToolParam> {
            Vec::new()
        }
        async fn execute(&self, _args: &Value) -> Result<Value, ToolError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            self.outcome
                .clone()
                .map_err(ToolError::Failed)
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AnalyticsSink for FailingSink {
        async fn track_execution(&self, _record: ToolCall) -> Result<(), AnalyticsError> {
            Err(AnalyticsError("sink offline".into()))
        }
    }

    struct Fixture {
        dispatcher: ExecutionDispatcher,
        registry: Arc<ToolRegistry>,
        sink: Arc<MemorySink>,
        invocations: Arc<AtomicUsize>,
    }

    fn fixture(outcome: Result<Value, String>) -> Fixture {
        let registry = Arc::new(ToolRegistry::new());
        let invocations = Arc::new(AtomicUsize::new(0));
        registry
            .register(Arc::new(CountingTool {
                invocations: invocations.clone(),
                outcome,
            }))
            .unwrap();
        let sink = Arc::new(MemorySink::new(16));
        let dispatcher = ExecutionDispatcher::new(
            registry.clone(),
            Arc::new(RolePolicy::with_defaults()),
            sink.clone(),
            Arc::new(BroadcastHub::new()),
        );
        Fixture {
            dispatcher,
            registry,
            sink,
            invocations,
        }
    }

    #[tokio::test]
    async fn disabled_tool_never_invokes_capability() {
        let fx = fixture(Ok(json!("unused")));
        fx.registry.set_enabled("counting", false).unwrap();
        for _ in 0..3 {
            let err = fx
                .dispatcher
                .execute("counting", json!({}), "admin")
                .await
                .unwrap_err();
            assert!(matches!(err, DispatchError::ToolUnavailable(_)));
        }
        assert_eq!(fx.invocations.load(Ordering::SeqCst), 0);
        assert!(fx.sink.is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_is_unavailable() {
        let fx = fixture(Ok(json!("unused")));
        let err = fx
            .dispatcher
            .execute("phantom", json!({}), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ToolUnavailable(name) if name == "phantom"));
    }

    #[tokio::test]
    async fn denied_role_emits_no_record() {
        let fx = fixture(Ok(json!("unused")));
        let err = fx
            .dispatcher
            .execute("counting", json!({}), "guest")
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unauthorized { .. }));
        assert_eq!(fx.invocations.load(Ordering::SeqCst), 0);
        assert!(fx.sink.is_empty());
    }

    #[tokio::test]
    async fn success_returns_value_and_records_it() {
        let fx = fixture(Ok(json!({"answer": 42})));
        let value = fx
            .dispatcher
            .execute("counting", json!({"q": "life"}), "admin")
            .await
            .unwrap();
        assert_eq!(value, json!({"answer": 42}));

        let records = fx.sink.recent();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.status, CallStatus::Success);
        assert_eq!(record.result, Some(json!({"answer": 42})));
        assert_eq!(record.args, json!({"q": "life"}));
        assert!(record.duration_ms.is_some());
    }

    #[tokio::test]
    async fn failure_surfaces_original_error_and_records_description() {
        let fx = fixture(Err("command exploded".into()));
        let err = fx
            .dispatcher
            .execute("counting", json!({}), "admin")
            .await
            .unwrap_err();
        // The original failure text, not a masked one.
        assert_eq!(err.to_string(), "command exploded");

        let records = fx.sink.recent();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, CallStatus::Error);
        let description = records[0].result.as_ref().unwrap().as_str().unwrap();
        assert!(!description.is_empty());
        assert!(description.contains("command exploded"));
    }

    #[tokio::test]
    async fn sink_failure_never_masks_the_outcome() {
        let registry = Arc::new(ToolRegistry::new());
        let invocations = Arc::new(AtomicUsize::new(0));
        registry
            .register(Arc::new(CountingTool {
                invocations,
                outcome: Ok(json!("fine")),
            }))
            .unwrap();
        let dispatcher = ExecutionDispatcher::new(
            registry,
            Arc::new(RolePolicy::with_defaults()),
            Arc::new(FailingSink),
            Arc::new(BroadcastHub::new()),
        );
        let value = dispatcher
            .execute("counting", json!({}), "admin")
            .await
            .unwrap();
        assert_eq!(value, json!("fine"));
    }

    #[tokio::test]
    async fn record_ids_are_unique_per_call() {
        let fx = fixture(Ok(json!(1)));
        fx.dispatcher
            .execute("counting", json!({}), "admin")
            .await
            .unwrap();
        fx.dispatcher
            .execute("counting", json!({}), "admin")
            .await
            .unwrap();
        let records = fx.sink.recent();
        assert_ne!(records[0].id, records[1].id);
    }
}
