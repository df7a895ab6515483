//! The node trait and its static descriptor.

use async_trait::async_trait;
use weft_workflow::NodeCategory;

use crate::error::NodeError;
use crate::input::NodeInput;
use crate::outcome::NodeOutcome;
use crate::port::PortSpec;
use crate::resource::ResourceClass;
use crate::trigger::TriggerNode;

/// Static metadata describing a node type.
///
/// Used for registry discovery, trigger capability checks, concurrency
/// admission, and editor schemas.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    /// Registry key identifying this node type (e.g. `"http.request"`).
    pub node_type: String,
    /// Human-readable display name.
    pub name: String,
    /// Short description of what this node does.
    pub description: String,
    /// Category used for trigger discovery and UI grouping.
    pub category: NodeCategory,
    /// Declared input ports.
    pub input_ports: Vec<PortSpec>,
    /// Declared output ports. The first entry is the node's primary port,
    /// used by single-port input assembly.
    pub output_ports: Vec<PortSpec>,
    /// JSON Schema describing the configuration form.
    pub config_schema: serde_json::Value,
    /// Concurrency pools this node draws permits from.
    pub resource_classes: Vec<ResourceClass>,
}

impl NodeDescriptor {
    /// Create a descriptor with the minimum required fields.
    #[must_use]
    pub fn new(
        node_type: impl Into<String>,
        name: impl Into<String>,
        category: NodeCategory,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            name: name.into(),
            description: String::new(),
            category,
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            config_schema: serde_json::Value::Null,
            resource_classes: vec![ResourceClass::Standard],
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an input port.
    #[must_use]
    pub fn with_input(mut self, port: PortSpec) -> Self {
        self.input_ports.push(port);
        self
    }

    /// Add an output port.
    #[must_use]
    pub fn with_output(mut self, port: PortSpec) -> Self {
        self.output_ports.push(port);
        self
    }

    /// Replace the resource classes.
    #[must_use]
    pub fn with_resources(mut self, classes: Vec<ResourceClass>) -> Self {
        self.resource_classes = classes;
        self
    }

    /// Set the configuration schema.
    #[must_use]
    pub fn with_config_schema(mut self, schema: serde_json::Value) -> Self {
        self.config_schema = schema;
        self
    }

    /// Name of the primary (first) output port, if any.
    #[must_use]
    pub fn primary_output(&self) -> Option<&str> {
        self.output_ports.first().map(|p| p.name.as_str())
    }
}

/// An executable unit with typed ports.
///
/// Implementations are `Send + Sync` so one instance can serve concurrent
/// executions; per-run state travels in [`NodeInput`]. Long-running nodes
/// must check `input.check_cancelled()` cooperatively.
///
/// Capabilities are composed, not inherited: a node that is also a trigger
/// returns itself from [`as_trigger`](Self::as_trigger), and the trigger
/// manager probes for it at activation time.
#[async_trait]
pub trait Node: Send + Sync {
    /// Static metadata for this node type.
    fn descriptor(&self) -> &NodeDescriptor;

    /// Execute the node with the assembled input.
    async fn execute(&self, input: NodeInput) -> Result<NodeOutcome, NodeError>;

    /// The trigger capability, if this node is a long-lived event source.
    fn as_trigger(&self) -> Option<&dyn TriggerNode> {
        None
    }
}
