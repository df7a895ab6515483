//! Engine error types.

use thiserror::Error;
use weft_core::{ExecutionId, NodeId, WorkflowId};
use weft_execution::ExecutionError;
use weft_node::NodeError;
use weft_workflow::ValidationError;

/// Errors surfaced by the orchestrator and trigger manager.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The referenced workflow does not exist.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    /// The referenced execution does not exist.
    #[error("execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    /// Trigger activation was attempted on an already-active workflow.
    #[error("workflow {0} is already active")]
    AlreadyActive(WorkflowId),

    /// Trigger activation was attempted on a workflow without trigger
    /// nodes.
    #[error("workflow {0} has no trigger nodes")]
    NoTriggers(WorkflowId),

    /// A TRIGGERS-category node does not implement the trigger capability.
    #[error("node {0} has category triggers but no trigger capability")]
    NotATrigger(NodeId),

    /// Trigger activation failed; already-started triggers were rolled
    /// back.
    #[error("failed to activate workflow {workflow_id}: {reason}")]
    ActivationFailed {
        /// The workflow being activated.
        workflow_id: WorkflowId,
        /// What went wrong.
        reason: String,
    },

    /// The workflow definition failed structural validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An execution state error.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// A node-level error escaped the executor.
    #[error(transparent)]
    Node(#[from] NodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let id = WorkflowId::v4();
        assert_eq!(
            EngineError::WorkflowNotFound(id).to_string(),
            format!("workflow not found: {id}")
        );
    }

    #[test]
    fn already_active_display() {
        let id = WorkflowId::v4();
        assert!(
            EngineError::AlreadyActive(id)
                .to_string()
                .contains("already active")
        );
    }

    #[test]
    fn validation_error_converts() {
        let node = NodeId::v4();
        let err = EngineError::from(ValidationError::DuplicateNodeId(node));
        assert!(err.to_string().contains("duplicate node id"));
    }

    #[test]
    fn node_error_converts() {
        let err = EngineError::from(NodeError::fatal("bad config"));
        assert_eq!(err.to_string(), "fatal: bad config");
    }
}
