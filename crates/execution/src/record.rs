//! The persisted shape of an execution.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weft_core::{ExecutionId, NodeId, WorkflowId};

use crate::context::{ExecutionContext, ExecutionFault, LogEvent};
use crate::error::ExecutionError;
use crate::mode::ExecutionMode;
use crate::result::NodeRunResult;
use crate::status::ExecutionStatus;
use crate::transition::validate_transition;

/// Durable record of a run, written at creation and updated at every
/// status transition.
///
/// The storage backend is out of scope; this is the minimum shape the
/// engine requires from whatever persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// This run's identifier.
    pub execution_id: ExecutionId,
    /// Workflow that was executed.
    pub workflow_id: WorkflowId,
    /// Current status.
    pub status: ExecutionStatus,
    /// When the run started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// How the run was initiated.
    pub execution_source: String,
    /// Scheduling mode.
    pub execution_mode: ExecutionMode,
    /// Sink node outputs.
    #[serde(default)]
    pub final_outputs: serde_json::Map<String, serde_json::Value>,
    /// Per-node terminal results.
    #[serde(default)]
    pub node_results: HashMap<NodeId, NodeRunResult>,
    /// Chronological execution log.
    #[serde(default)]
    pub execution_log: Vec<LogEvent>,
    /// Node-level failures.
    #[serde(default)]
    pub errors: Vec<ExecutionFault>,
    /// Run summary and free-form metadata.
    #[serde(default)]
    pub execution_metadata: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionRecord {
    /// A fresh record for a run that is about to start.
    #[must_use]
    pub fn started(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        execution_source: impl Into<String>,
        execution_mode: ExecutionMode,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            status: ExecutionStatus::Running,
            started_at: Some(Utc::now()),
            completed_at: None,
            execution_source: execution_source.into(),
            execution_mode,
            final_outputs: serde_json::Map::new(),
            node_results: HashMap::new(),
            execution_log: Vec::new(),
            errors: Vec::new(),
            execution_metadata: serde_json::Map::new(),
        }
    }

    /// Transition the record's status, validating monotonicity. Terminal
    /// transitions stamp `completed_at`.
    pub fn transition_to(&mut self, status: ExecutionStatus) -> Result<(), ExecutionError> {
        validate_transition(self.status, status)?;
        self.status = status;
        if status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Fold a finished context into this record under the given terminal
    /// status.
    pub fn absorb(
        &mut self,
        status: ExecutionStatus,
        context: &ExecutionContext,
    ) -> Result<(), ExecutionError> {
        validate_transition(self.status, status)?;
        self.status = status;
        self.started_at = context.started_at;
        self.completed_at = context.completed_at;
        self.final_outputs = context.final_outputs.clone();
        self.node_results = context.node_results.clone();
        self.execution_log = context.execution_log.clone();
        self.errors = context.errors.clone();
        self.execution_metadata
            .insert("summary".into(), context.summary());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use weft_node::PortMap;

    #[test]
    fn started_record_is_running() {
        let record = ExecutionRecord::started(
            ExecutionId::v4(),
            WorkflowId::v4(),
            "manual",
            ExecutionMode::Parallel,
        );
        assert_eq!(record.status, ExecutionStatus::Running);
        assert!(record.started_at.is_some());
        assert!(record.completed_at.is_none());
        assert!(record.node_results.is_empty());
    }

    #[test]
    fn absorb_copies_terminal_state() {
        let mut record = ExecutionRecord::started(
            ExecutionId::v4(),
            WorkflowId::v4(),
            "schedule",
            ExecutionMode::Parallel,
        );

        let mut ctx = ExecutionContext::new(record.workflow_id, record.execution_id);
        ctx.start_execution();
        ctx.set_node_result(NodeRunResult::failed(NodeId::v4(), "boom"))
            .unwrap();
        ctx.complete_execution();

        record
            .absorb(ExecutionStatus::CompletedWithErrors, &ctx)
            .unwrap();

        assert_eq!(record.status, ExecutionStatus::CompletedWithErrors);
        assert_eq!(record.node_results.len(), 1);
        assert_eq!(record.errors.len(), 1);
        assert!(record.completed_at.is_some());
        assert_eq!(
            record.execution_metadata["summary"]["failed_nodes"],
            serde_json::json!(1)
        );
    }

    #[test]
    fn transitions_are_validated() {
        let mut record = ExecutionRecord::started(
            ExecutionId::v4(),
            WorkflowId::v4(),
            "manual",
            ExecutionMode::Parallel,
        );
        record.transition_to(ExecutionStatus::Cancelled).unwrap();
        assert!(record.completed_at.is_some());

        // Terminal records accept no further transitions.
        let err = record.transition_to(ExecutionStatus::Running).unwrap_err();
        assert!(err.to_string().contains("invalid transition"));

        let ctx = ExecutionContext::new(record.workflow_id, record.execution_id);
        assert!(record.absorb(ExecutionStatus::Completed, &ctx).is_err());
    }

    #[test]
    fn serde_round_trip() {
        let mut record = ExecutionRecord::started(
            ExecutionId::v4(),
            WorkflowId::v4(),
            "manual",
            ExecutionMode::Sequential,
        );
        let node = NodeId::v4();
        let mut outputs = PortMap::new();
        outputs.insert("output".into(), serde_json::json!(true));
        record
            .node_results
            .insert(node, NodeRunResult::succeeded(node, outputs));

        let json = serde_json::to_string(&record).unwrap();
        let back: ExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.execution_id, record.execution_id);
        assert_eq!(back.execution_mode, ExecutionMode::Sequential);
        assert_eq!(back.node_results.len(), 1);
    }
}
