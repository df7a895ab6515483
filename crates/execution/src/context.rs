//! The per-run execution ledger.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weft_core::{ExecutionId, NodeId, UserId, WorkflowId};
use weft_node::{InteractionRequest, PortMap};

use crate::error::ExecutionError;
use crate::mode::{ExecutionMode, TimeMode};
use crate::progress::ExecutionProgress;
use crate::result::NodeRunResult;
use crate::variables::VariableStore;

/// One entry in the chronological execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Event type (e.g. `"execution_started"`, `"node_executed"`).
    pub event_type: String,
    /// Event payload.
    pub data: serde_json::Value,
}

/// A node-level failure captured during the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFault {
    /// The node that failed.
    pub node_id: NodeId,
    /// Error message.
    pub error: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Mutable per-run state, owned by the executor.
///
/// The context is a ledger, not a coordinator: it is only ever mutated
/// from the executor's scheduling path. Node task bodies read snapshots
/// and return outputs as values; the completion handler applies them
/// here. That discipline is what removes data races without locks on
/// individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Workflow being executed.
    pub workflow_id: WorkflowId,
    /// This run's identifier.
    pub execution_id: ExecutionId,
    /// How the run was initiated (`"manual"`, `"schedule"`, `"webhook"`…).
    pub execution_source: String,
    /// Payload from the trigger that started the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_data: Option<serde_json::Value>,
    /// User that started the run, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_by: Option<UserId>,
    /// Scheduling mode.
    pub execution_mode: ExecutionMode,
    /// Clock mode.
    #[serde(default)]
    pub time_mode: TimeMode,
    /// Current virtual timestamp when `time_mode` is virtual.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_time: Option<DateTime<Utc>>,
    /// Per-node outputs, populated as nodes complete.
    #[serde(default)]
    pub node_outputs: HashMap<NodeId, PortMap>,
    /// Per-node terminal results, written exactly once per node.
    #[serde(default)]
    pub node_results: HashMap<NodeId, NodeRunResult>,
    /// Chronological execution log.
    #[serde(default)]
    pub execution_log: Vec<LogEvent>,
    /// Shared variable namespace.
    #[serde(default)]
    pub variables: VariableStore,
    /// Human interactions awaiting resolution, by suspended node.
    #[serde(default)]
    pub pending_interactions: HashMap<NodeId, InteractionRequest>,
    /// Node-level failures, in the order they occurred.
    #[serde(default)]
    pub errors: Vec<ExecutionFault>,
    /// Live progress counters.
    #[serde(default)]
    pub progress: ExecutionProgress,
    /// When the run started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Outputs of the sink nodes, keyed by node id.
    #[serde(default)]
    pub final_outputs: serde_json::Map<String, serde_json::Value>,
    /// Origin URL of the frontend that started the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_origin: Option<String>,
    /// Free-form run metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionContext {
    /// Create a context for a run.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, execution_id: ExecutionId) -> Self {
        Self {
            workflow_id,
            execution_id,
            execution_source: "manual".to_owned(),
            trigger_data: None,
            started_by: None,
            execution_mode: ExecutionMode::default(),
            time_mode: TimeMode::default(),
            virtual_time: None,
            node_outputs: HashMap::new(),
            node_results: HashMap::new(),
            execution_log: Vec::new(),
            variables: VariableStore::default(),
            pending_interactions: HashMap::new(),
            errors: Vec::new(),
            progress: ExecutionProgress::default(),
            started_at: None,
            completed_at: None,
            final_outputs: serde_json::Map::new(),
            frontend_origin: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Set the execution source label.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.execution_source = source.into();
        self
    }

    /// Attach trigger data; it is also exposed as the `trigger_data`
    /// variable.
    #[must_use]
    pub fn with_trigger_data(mut self, data: serde_json::Value) -> Self {
        self.variables.set("trigger_data", data.clone());
        self.trigger_data = Some(data);
        self
    }

    /// Set the scheduling mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        if mode == ExecutionMode::Simulation {
            self.time_mode = TimeMode::Virtual;
        }
        self
    }

    /// Record who started the run.
    #[must_use]
    pub fn with_started_by(mut self, user: UserId) -> Self {
        self.started_by = Some(user);
        self
    }

    /// Record the originating frontend URL.
    #[must_use]
    pub fn with_frontend_origin(mut self, origin: impl Into<String>) -> Self {
        self.frontend_origin = Some(origin.into());
        self
    }

    /// Seed initial workflow variables.
    #[must_use]
    pub fn with_initial_variables(
        mut self,
        initial: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        for (key, value) in initial {
            self.variables.set(key, value);
        }
        self
    }

    /// Current time: the virtual clock in virtual mode, wall clock
    /// otherwise.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match (self.time_mode, self.virtual_time) {
            (TimeMode::Virtual, Some(t)) => t,
            _ => Utc::now(),
        }
    }

    /// Advance the virtual clock.
    ///
    /// Initializes the clock from `started_at` on first use. A warning is
    /// logged and nothing happens in real-time mode.
    pub fn advance_virtual_time(&mut self, delta: Duration) {
        if self.time_mode != TimeMode::Virtual {
            tracing::warn!(
                execution_id = %self.execution_id,
                "cannot advance virtual time in real-time mode"
            );
            return;
        }
        let base = self
            .virtual_time
            .or(self.started_at)
            .unwrap_or_else(Utc::now);
        self.virtual_time =
            Some(base + chrono::TimeDelta::milliseconds(delta.as_millis() as i64));
    }

    /// Mark the run as started and log the event.
    pub fn start_execution(&mut self) {
        self.started_at = Some(Utc::now());
        self.log_event(
            "execution_started",
            serde_json::json!({
                "execution_source": self.execution_source,
                "execution_mode": self.execution_mode.to_string(),
            }),
        );
    }

    /// Mark the run as completed and log the summary event.
    pub fn complete_execution(&mut self) {
        self.completed_at = Some(Utc::now());
        self.log_event(
            "execution_completed",
            serde_json::json!({
                "duration_ms": self.duration_ms(),
                "total_nodes": self.node_results.len(),
                "successful_nodes": self.node_results.values().filter(|r| r.success).count(),
                "failed_nodes": self
                    .node_results
                    .values()
                    .filter(|r| !r.success && !r.skipped)
                    .count(),
            }),
        );
    }

    /// Outputs of a node, if it has produced any.
    #[must_use]
    pub fn get_node_outputs(&self, node_id: NodeId) -> Option<&PortMap> {
        self.node_outputs.get(&node_id)
    }

    /// Replace a node's outputs.
    pub fn set_node_outputs(&mut self, node_id: NodeId, outputs: PortMap) {
        self.node_outputs.insert(node_id, outputs);
    }

    /// Record a node's terminal result.
    ///
    /// Successful results also publish the node's outputs; failures are
    /// appended to the error list. A `node_executed` event is logged
    /// either way. Writing a second result for the same node is an error.
    pub fn set_node_result(&mut self, result: NodeRunResult) -> Result<(), ExecutionError> {
        if self.node_results.contains_key(&result.node_id) {
            return Err(ExecutionError::DuplicateResult(result.node_id));
        }

        if result.success {
            self.set_node_outputs(result.node_id, result.outputs.clone());
        }

        self.log_event(
            "node_executed",
            serde_json::json!({
                "node_id": result.node_id,
                "success": result.success,
                "skipped": result.skipped,
                "duration_ms": result.duration_ms,
                "error": result.error,
            }),
        );

        if let Some(error) = &result.error {
            self.errors.push(ExecutionFault {
                node_id: result.node_id,
                error: error.clone(),
                timestamp: Utc::now(),
            });
        }

        self.node_results.insert(result.node_id, result);
        Ok(())
    }

    /// A node's terminal result, if recorded.
    #[must_use]
    pub fn get_node_result(&self, node_id: NodeId) -> Option<&NodeRunResult> {
        self.node_results.get(&node_id)
    }

    /// Append an event to the execution log.
    pub fn log_event(&mut self, event_type: impl Into<String>, data: serde_json::Value) {
        self.execution_log.push(LogEvent {
            timestamp: Utc::now(),
            event_type: event_type.into(),
            data,
        });
    }

    /// Set a workflow variable.
    pub fn set_variable(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.variables.set(name, value);
    }

    /// Get a workflow variable, with a default when unset.
    #[must_use]
    pub fn get_variable(
        &self,
        name: &str,
        default: Option<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.variables.get(name).cloned().or(default)
    }

    /// Elapsed run time in milliseconds; for an unfinished run, time since
    /// start.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or_else(Utc::now);
        Some((end - started).num_milliseconds().max(0) as u64)
    }

    /// Summary used by the orchestrator when persisting the run.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        let successful = self.node_results.values().filter(|r| r.success).count();
        let failed = self
            .node_results
            .values()
            .filter(|r| !r.success && !r.skipped)
            .count();
        serde_json::json!({
            "workflow_id": self.workflow_id,
            "execution_id": self.execution_id,
            "started_at": self.started_at,
            "completed_at": self.completed_at,
            "duration_ms": self.duration_ms(),
            "execution_mode": self.execution_mode.to_string(),
            "total_nodes": self.node_results.len(),
            "successful_nodes": successful,
            "failed_nodes": failed,
            "total_errors": self.errors.len(),
            "has_errors": !self.errors.is_empty(),
            "progress": self.progress.snapshot(),
        })
    }
}
