//! Structural validation of workflow definitions.

use std::collections::HashSet;

use thiserror::Error;
use weft_core::NodeId;

use crate::definition::WorkflowDefinition;

/// A structural defect that makes a workflow unfit for execution.
///
/// Validation is strict where [`GraphBuilder`](crate::GraphBuilder) is
/// lenient: the orchestrator rejects a definition up front, while the
/// builder merely records warnings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two nodes share the same identifier.
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    /// A connection references a source node that does not exist.
    #[error("connection references unknown source node: {0}")]
    UnknownSourceNode(NodeId),

    /// A connection references a target node that does not exist.
    #[error("connection references unknown target node: {0}")]
    UnknownTargetNode(NodeId),

    /// A connection loops a node back onto itself.
    #[error("node {0} is connected to itself")]
    SelfConnection(NodeId),
}

/// Validate the structure of a workflow definition.
///
/// Returns the first defect found, in definition order.
pub fn validate(workflow: &WorkflowDefinition) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for node in &workflow.nodes {
        if !seen.insert(node.id) {
            return Err(ValidationError::DuplicateNodeId(node.id));
        }
    }

    for conn in &workflow.connections {
        if !seen.contains(&conn.source_node_id) {
            return Err(ValidationError::UnknownSourceNode(conn.source_node_id));
        }
        if !seen.contains(&conn.target_node_id) {
            return Err(ValidationError::UnknownTargetNode(conn.target_node_id));
        }
        if conn.source_node_id == conn.target_node_id {
            return Err(ValidationError::SelfConnection(conn.source_node_id));
        }
    }

    Ok(())
}
