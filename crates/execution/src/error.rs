//! Execution error types.

use thiserror::Error;
use weft_core::NodeId;

use crate::status::ExecutionStatus;

/// Errors raised by execution state handling.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A status transition is not valid for the current status.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: ExecutionStatus,
        /// Attempted target status.
        to: ExecutionStatus,
    },

    /// A referenced node does not exist in the run.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node's result was written more than once.
    #[error("result for node {0} already recorded")]
    DuplicateResult(NodeId),

    /// A serialization or deserialization failure.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The execution was cancelled.
    #[error("execution cancelled")]
    Cancelled,
}

impl ExecutionError {
    /// Create an invalid-transition error.
    #[must_use]
    pub fn invalid_transition(from: ExecutionStatus, to: ExecutionStatus) -> Self {
        Self::InvalidTransition { from, to }
    }
}
