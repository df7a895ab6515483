//! Input handed to a node at execution time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use weft_core::{CredentialId, ExecutionId, NodeId, WorkflowId};

use crate::credentials::CredentialData;
use crate::error::NodeError;
use crate::port::PortMap;

type NodeRunnerFn =
    dyn Fn(NodeId, PortMap) -> BoxFuture<'static, Result<PortMap, NodeError>> + Send + Sync;

/// Callback that lets a node invoke a sibling node by id.
///
/// Used by agent-style nodes that orchestrate other nodes as tools. The
/// engine constructs the runner so invoked siblings get the same config
/// resolution and credential plumbing as scheduled nodes.
#[derive(Clone)]
pub struct NodeRunner(Arc<NodeRunnerFn>);

impl NodeRunner {
    /// Wrap a closure as a node runner.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(NodeId, PortMap) -> BoxFuture<'static, Result<PortMap, NodeError>>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    /// Execute the node with the given id and ad-hoc inputs.
    pub async fn run(&self, node_id: NodeId, inputs: PortMap) -> Result<PortMap, NodeError> {
        (*self.0)(node_id, inputs).await
    }
}

impl fmt::Debug for NodeRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodeRunner(..)")
    }
}

/// Everything the engine provides to a node for one execution attempt.
///
/// Inputs are assembled fresh for every attempt, so a retry observes any
/// upstream outputs or variables that changed since the previous attempt.
#[derive(Debug, Clone)]
pub struct NodeInput {
    /// Values arriving on input ports from connected nodes.
    pub ports: PortMap,
    /// Workflow being executed.
    pub workflow_id: WorkflowId,
    /// Execution run identifier.
    pub execution_id: ExecutionId,
    /// The node being executed.
    pub node_id: NodeId,
    /// Snapshot of the shared variable namespace, node-shared bindings
    /// under the reserved `_nodes` key.
    pub variables: serde_json::Map<String, serde_json::Value>,
    /// Node configuration with variable references already resolved.
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Plaintext credential data keyed by credential id.
    pub credentials: HashMap<CredentialId, CredentialData>,
    /// Callback for invoking sibling nodes, when the engine provides one.
    pub node_runner: Option<NodeRunner>,
    /// Origin URL of the frontend that started this execution, used by
    /// nodes that generate review links.
    pub frontend_origin: Option<String>,
    /// Cancellation signal checked cooperatively by long-running nodes.
    pub cancellation: CancellationToken,
}

impl NodeInput {
    /// Create a minimal input with the given identifiers.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, execution_id: ExecutionId, node_id: NodeId) -> Self {
        Self {
            ports: PortMap::new(),
            workflow_id,
            execution_id,
            node_id,
            variables: serde_json::Map::new(),
            config: serde_json::Map::new(),
            credentials: HashMap::new(),
            node_runner: None,
            frontend_origin: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Replace the port values.
    #[must_use]
    pub fn with_ports(mut self, ports: PortMap) -> Self {
        self.ports = ports;
        self
    }

    /// Replace the resolved configuration.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Map<String, serde_json::Value>) -> Self {
        self.config = config;
        self
    }

    /// Replace the variable snapshot.
    #[must_use]
    pub fn with_variables(mut self, variables: serde_json::Map<String, serde_json::Value>) -> Self {
        self.variables = variables;
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Read a port value.
    #[must_use]
    pub fn port(&self, name: &str) -> Option<&serde_json::Value> {
        self.ports.get(name)
    }

    /// Read a configuration value.
    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.config.get(key)
    }

    /// Check whether execution has been cancelled.
    ///
    /// Nodes should call this in loops and before expensive operations.
    pub fn check_cancelled(&self) -> Result<(), NodeError> {
        if self.cancellation.is_cancelled() {
            Err(NodeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
