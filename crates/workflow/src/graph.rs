//! The derived execution graph the scheduler runs against.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use weft_core::{NodeId, WorkflowId};

use crate::connection::Connection;

/// Per-node dependency bookkeeping within an [`ExecutionGraph`].
///
/// `dependencies` and `dependents` only contain execution-order edges;
/// capability connections appear in the connection lists but never in the
/// dependency sets. Insertion order is preserved so scheduling tie-breaks
/// are deterministic.
#[derive(Debug, Clone)]
pub struct NodeDependencies {
    /// The node this entry describes.
    pub node_id: NodeId,
    /// Nodes that must resolve before this node may run.
    pub dependencies: IndexSet<NodeId>,
    /// Nodes waiting on this node.
    pub dependents: IndexSet<NodeId>,
    /// All connections targeting this node, capability edges included.
    pub input_connections: Vec<Connection>,
    /// All connections originating from this node, capability edges included.
    pub output_connections: Vec<Connection>,
    /// Dependency count at graph construction time.
    pub original_dep_count: usize,
    /// Dependencies not yet resolved; decremented by the executor.
    pub remaining_deps: usize,
}

impl NodeDependencies {
    /// Create an empty entry for a node.
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            input_connections: Vec::new(),
            output_connections: Vec::new(),
            original_dep_count: 0,
            remaining_deps: 0,
        }
    }
}

/// Immutable-per-run topology derived from a workflow definition.
///
/// Created at run start by [`GraphBuilder`](crate::GraphBuilder) and
/// discarded at run end. The executor owns the graph for the duration of
/// the run and is the only writer of `remaining_deps`.
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    /// Workflow this graph was derived from.
    pub workflow_id: WorkflowId,
    /// Per-node dependency entries, in workflow definition order.
    pub nodes: IndexMap<NodeId, NodeDependencies>,
    /// Nodes with no execution-order dependencies, excluding capability-only
    /// providers. These seed the ready set.
    pub source_nodes: Vec<NodeId>,
    /// Nodes with no execution-order dependents.
    pub sink_nodes: Vec<NodeId>,
    /// Nodes whose every output targets a capability port. Never scheduled.
    pub capability_only_nodes: IndexSet<NodeId>,
    /// Nodes in the UI category, rendered by the frontend only.
    pub ui_nodes: IndexSet<NodeId>,
    /// Structural warnings collected during construction. Never fatal.
    pub warnings: Vec<String>,
}

impl ExecutionGraph {
    /// Look up a node's dependency entry.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeDependencies> {
        self.nodes.get(&id)
    }

    /// Mutable access to a node's dependency entry.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeDependencies> {
        self.nodes.get_mut(&id)
    }

    /// Number of nodes the scheduler will account for.
    ///
    /// Capability-only providers are excluded: they are never dispatched,
    /// so they never enter the progress counters.
    #[must_use]
    pub fn schedulable_count(&self) -> usize {
        self.nodes.len() - self.capability_only_nodes.len()
    }

    /// Returns `true` if the execution-order edges contain a cycle.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        let mut graph = DiGraph::<NodeId, ()>::new();
        let mut indices = IndexMap::new();
        for &id in self.nodes.keys() {
            indices.insert(id, graph.add_node(id));
        }
        for entry in self.nodes.values() {
            for &dep in &entry.dependencies {
                if let (Some(&from), Some(&to)) = (indices.get(&dep), indices.get(&entry.node_id)) {
                    graph.add_edge(from, to, ());
                }
            }
        }
        is_cyclic_directed(&graph)
    }

    /// Deterministic topological order of the schedulable nodes.
    ///
    /// Kahn's algorithm seeded with the source nodes in definition order;
    /// ties follow the insertion order of each node's `dependents` set.
    /// Sequential execution dispatches in exactly this order. Nodes caught
    /// in a cycle are omitted.
    #[must_use]
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut remaining: IndexMap<NodeId, usize> = self
            .nodes
            .iter()
            .map(|(&id, entry)| (id, entry.original_dep_count))
            .collect();
        let mut queue: VecDeque<NodeId> = self.source_nodes.iter().copied().collect();
        let mut order = Vec::with_capacity(self.schedulable_count());

        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(entry) = self.nodes.get(&id) {
                for &dependent in &entry.dependents {
                    if let Some(count) = remaining.get_mut(&dependent) {
                        *count -= 1;
                        if *count == 0 && !self.capability_only_nodes.contains(&dependent) {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_execution_graph;
    use crate::definition::{NodeCategory, NodeConfig, WorkflowDefinition};
    use pretty_assertions::assert_eq;

    fn node(id: NodeId) -> NodeConfig {
        NodeConfig::new(id, "n", "test.echo", NodeCategory::Processing)
    }

    fn linear_workflow() -> (WorkflowDefinition, NodeId, NodeId, NodeId) {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let wf = WorkflowDefinition::new("linear")
            .with_node(node(a))
            .with_node(node(b))
            .with_node(node(c))
            .with_connection(Connection::new(a, b))
            .with_connection(Connection::new(b, c));
        (wf, a, b, c)
    }

    #[test]
    fn topological_order_linear() {
        let (wf, a, b, c) = linear_workflow();
        let graph = build_execution_graph(&wf);
        assert_eq!(graph.topological_order(), vec![a, b, c]);
    }

    #[test]
    fn topological_order_diamond_follows_insertion_order() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let d = NodeId::v4();
        let wf = WorkflowDefinition::new("diamond")
            .with_node(node(a))
            .with_node(node(b))
            .with_node(node(c))
            .with_node(node(d))
            .with_connection(Connection::new(a, b))
            .with_connection(Connection::new(a, c))
            .with_connection(Connection::new(b, d))
            .with_connection(Connection::new(c, d));
        let graph = build_execution_graph(&wf);
        // B before C because the A→B connection was declared first.
        assert_eq!(graph.topological_order(), vec![a, b, c, d]);
    }

    #[test]
    fn topological_order_omits_cycles() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let wf = WorkflowDefinition::new("cycle")
            .with_node(node(a))
            .with_node(node(b))
            .with_connection(Connection::new(a, b))
            .with_connection(Connection::new(b, a));
        let graph = build_execution_graph(&wf);
        assert!(graph.is_cyclic());
        assert!(graph.topological_order().is_empty());
    }

    #[test]
    fn acyclic_graph_reports_not_cyclic() {
        let (wf, ..) = linear_workflow();
        let graph = build_execution_graph(&wf);
        assert!(!graph.is_cyclic());
    }

    #[test]
    fn schedulable_count_excludes_capability_providers() {
        let provider = NodeId::v4();
        let agent = NodeId::v4();
        let wf = WorkflowDefinition::new("tools")
            .with_node(node(provider))
            .with_node(node(agent))
            .with_connection(Connection::with_ports(provider, "output", agent, "tools"));
        let graph = build_execution_graph(&wf);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.schedulable_count(), 1);
    }
}
