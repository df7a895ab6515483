//! Process-local node discovery by type key.

use std::collections::HashMap;
use std::sync::Arc;

use weft_workflow::NodeConfig;

use crate::error::NodeError;
use crate::node::{Node, NodeDescriptor};

/// Factory producing node instances from workflow configuration.
///
/// Most node types are stateless and can return a shared instance;
/// triggers and other stateful nodes return a fresh instance per call so
/// each activation owns its monitoring state.
pub trait NodeFactory: Send + Sync {
    /// Static metadata for the node type this factory produces.
    fn descriptor(&self) -> &NodeDescriptor;

    /// Instantiate a node for the given configuration.
    fn create(&self, config: &NodeConfig) -> Result<Arc<dyn Node>, NodeError>;
}

/// Registry of node factories keyed by `node_type`.
///
/// Populated explicitly at process start — no filesystem scanning. The
/// engine resolves `node_type` keys from workflow definitions against
/// this registry when dispatching nodes and activating triggers.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. Overwrites any factory with the same key.
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let key = factory.descriptor().node_type.clone();
        self.factories.insert(key, factory);
    }

    /// Look up a factory by node type key.
    #[must_use]
    pub fn get(&self, node_type: &str) -> Option<&Arc<dyn NodeFactory>> {
        self.factories.get(node_type)
    }

    /// Check whether a node type is registered.
    #[must_use]
    pub fn contains(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Instantiate a node for a configuration.
    ///
    /// Fails when the configuration's `node_type` is not registered.
    pub fn instantiate(&self, config: &NodeConfig) -> Result<Arc<dyn Node>, NodeError> {
        let factory = self.factories.get(&config.node_type).ok_or_else(|| {
            NodeError::fatal(format!("node type not registered: {}", config.node_type))
        })?;
        factory.create(config)
    }

    /// Metadata for all registered node types.
    #[must_use]
    pub fn list(&self) -> Vec<&NodeDescriptor> {
        self.factories.values().map(|f| f.descriptor()).collect()
    }

    /// Number of registered node types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no node types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("count", &self.factories.len())
            .field("keys", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
