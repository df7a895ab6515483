//! User-facing workflow and node definitions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use weft_core::{CredentialId, NodeId, WorkflowId};

use crate::connection::Connection;
use crate::overrides::ExecutionOverrides;

/// UI / behavior category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Long-lived event sources that start executions.
    Triggers,
    /// LLM and agent nodes.
    Ai,
    /// Side-effecting actions (HTTP, email, files).
    Actions,
    /// Data transformation and control flow.
    Processing,
    /// Sub-workflow invocation.
    Workflow,
    /// Display-only nodes rendered by the frontend.
    Ui,
    /// Messaging integrations.
    Communication,
    /// Domain-specific business nodes.
    Business,
    /// Manual input sources.
    Input,
    /// Terminal output sinks.
    Output,
}

/// Configuration of a single node within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique identifier within the workflow.
    pub id: NodeId,
    /// Registry key of the node implementation (e.g. `"http.request"`).
    pub node_type: String,
    /// Display name.
    pub name: String,
    /// Category used for trigger discovery and UI grouping.
    pub category: NodeCategory,
    /// Node-specific configuration values.
    ///
    /// A value may be a literal, a `{"source": "variable", "variable_path": …}`
    /// reference resolved by the executor, or a
    /// `{"source": "template", "template": …}` string rendered by the node.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Publish this node's outputs into the shared variable namespace.
    #[serde(default)]
    pub share_output_to_variables: bool,
    /// Preferred variable key when sharing outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
    /// Per-node execution timeout; falls back to the run default.
    #[serde(default, with = "crate::serde_ms::opt", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Credentials this node needs, resolved by the executor before execution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<CredentialId>,
}

impl NodeConfig {
    /// Create a node configuration with empty config.
    #[must_use]
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        node_type: impl Into<String>,
        category: NodeCategory,
    ) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            name: name.into(),
            category,
            config: serde_json::Map::new(),
            share_output_to_variables: false,
            variable_name: None,
            timeout: None,
            credentials: Vec::new(),
        }
    }

    /// Set a configuration value.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Share this node's outputs under the given variable name.
    #[must_use]
    pub fn share_as(mut self, variable_name: impl Into<String>) -> Self {
        self.share_output_to_variables = true;
        self.variable_name = Some(variable_name.into());
        self
    }

    /// Share this node's outputs under a key derived from its id.
    #[must_use]
    pub fn share_outputs(mut self) -> Self {
        self.share_output_to_variables = true;
        self
    }

    /// Set the per-node timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A user-provided description of nodes and connections to be executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique workflow identifier.
    pub id: WorkflowId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Definition format version.
    pub version: Version,
    /// Ordered node configurations.
    pub nodes: Vec<NodeConfig>,
    /// Ordered connections between node ports.
    pub connections: Vec<Connection>,
    /// Initial workflow variables.
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
    /// Per-workflow overrides of the runtime budget.
    #[serde(default)]
    pub overrides: ExecutionOverrides,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Create an empty workflow with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::v4(),
            name: name.into(),
            description: None,
            version: Version::new(0, 1, 0),
            nodes: Vec::new(),
            connections: Vec::new(),
            variables: serde_json::Map::new(),
            overrides: ExecutionOverrides::default(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a node.
    #[must_use]
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    /// Append a connection.
    #[must_use]
    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Replace the execution overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ExecutionOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Look up a node configuration by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes in the TRIGGERS category, in definition order.
    pub fn trigger_nodes(&self) -> impl Iterator<Item = &NodeConfig> {
        self.nodes
            .iter()
            .filter(|n| n.category == NodeCategory::Triggers)
    }
}
