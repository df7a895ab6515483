//! Graph construction from a workflow definition.

use indexmap::{IndexMap, IndexSet};
use weft_core::NodeId;

use crate::definition::{NodeCategory, WorkflowDefinition};
use crate::graph::{ExecutionGraph, NodeDependencies};

/// Pure transformation: [`WorkflowDefinition`] → [`ExecutionGraph`].
///
/// Construction never fails. Structural oddities (connections referencing
/// unknown nodes, self-dependencies, a non-empty graph with no source
/// nodes) are collected as warnings on the resulting graph so a broken
/// workflow can still be loaded for diagnostic reporting; strict rejection
/// is the job of [`validate`](crate::error::validate).
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    workflow: &'a WorkflowDefinition,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder over a workflow definition.
    #[must_use]
    pub fn new(workflow: &'a WorkflowDefinition) -> Self {
        Self { workflow }
    }

    /// Build the execution graph.
    #[must_use]
    pub fn build(&self) -> ExecutionGraph {
        let mut warnings = Vec::new();

        let mut nodes: IndexMap<NodeId, NodeDependencies> = self
            .workflow
            .nodes
            .iter()
            .map(|cfg| (cfg.id, NodeDependencies::new(cfg.id)))
            .collect();

        for conn in &self.workflow.connections {
            let source = conn.source_node_id;
            let target = conn.target_node_id;

            if !nodes.contains_key(&source) {
                warnings.push(format!("connection references unknown source node {source}"));
                continue;
            }
            if !nodes.contains_key(&target) {
                warnings.push(format!("connection references unknown target node {target}"));
                continue;
            }

            // Data flow is always tracked, capability edges included.
            if let Some(entry) = nodes.get_mut(&target) {
                entry.input_connections.push(conn.clone());
            }
            if let Some(entry) = nodes.get_mut(&source) {
                entry.output_connections.push(conn.clone());
            }

            if conn.is_capability() {
                continue;
            }
            if source == target {
                warnings.push(format!("node {source} connects to itself; edge ignored"));
                continue;
            }

            if let Some(entry) = nodes.get_mut(&target) {
                entry.dependencies.insert(source);
            }
            if let Some(entry) = nodes.get_mut(&source) {
                entry.dependents.insert(target);
            }
        }

        for entry in nodes.values_mut() {
            entry.original_dep_count = entry.dependencies.len();
            entry.remaining_deps = entry.original_dep_count;
        }

        // A node whose every output feeds a capability port exists to equip
        // another node; it is never dispatched.
        let capability_only_nodes: IndexSet<NodeId> = nodes
            .values()
            .filter(|entry| {
                !entry.output_connections.is_empty()
                    && entry.output_connections.iter().all(|c| c.is_capability())
            })
            .map(|entry| entry.node_id)
            .collect();

        let source_nodes: Vec<NodeId> = nodes
            .values()
            .filter(|entry| {
                entry.dependencies.is_empty() && !capability_only_nodes.contains(&entry.node_id)
            })
            .map(|entry| entry.node_id)
            .collect();

        let sink_nodes: Vec<NodeId> = nodes
            .values()
            .filter(|entry| entry.dependents.is_empty())
            .map(|entry| entry.node_id)
            .collect();

        let ui_nodes: IndexSet<NodeId> = self
            .workflow
            .nodes
            .iter()
            .filter(|cfg| cfg.category == NodeCategory::Ui)
            .map(|cfg| cfg.id)
            .collect();

        let mut graph = ExecutionGraph {
            workflow_id: self.workflow.id,
            nodes,
            source_nodes,
            sink_nodes,
            capability_only_nodes,
            ui_nodes,
            warnings,
        };

        if graph.source_nodes.is_empty() && !graph.nodes.is_empty() {
            let detail = if graph.is_cyclic() {
                "no source nodes found (dependency cycle)"
            } else {
                "no source nodes found"
            };
            tracing::warn!(workflow_id = %self.workflow.id, "{detail}");
            graph.warnings.push(detail.to_owned());
        }

        graph
    }
}

/// Build an execution graph from a workflow definition.
#[must_use]
pub fn build_execution_graph(workflow: &WorkflowDefinition) -> ExecutionGraph {
    GraphBuilder::new(workflow).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::definition::NodeConfig;
    use pretty_assertions::assert_eq;

    fn node(id: NodeId) -> NodeConfig {
        NodeConfig::new(id, "n", "test.echo", NodeCategory::Processing)
    }

    fn node_in(id: NodeId, category: NodeCategory) -> NodeConfig {
        NodeConfig::new(id, "n", "test.echo", category)
    }

    #[test]
    fn single_node_is_both_source_and_sink() {
        let a = NodeId::v4();
        let wf = WorkflowDefinition::new("single").with_node(node(a));
        let graph = build_execution_graph(&wf);

        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.source_nodes, vec![a]);
        assert_eq!(graph.sink_nodes, vec![a]);
        assert!(graph.warnings.is_empty());
    }

    #[test]
    fn linear_chain_dependencies() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let wf = WorkflowDefinition::new("linear")
            .with_node(node(a))
            .with_node(node(b))
            .with_node(node(c))
            .with_connection(Connection::new(a, b))
            .with_connection(Connection::new(b, c));
        let graph = build_execution_graph(&wf);

        assert_eq!(graph.source_nodes, vec![a]);
        assert_eq!(graph.sink_nodes, vec![c]);

        assert!(graph.node(a).unwrap().dependencies.is_empty());
        assert!(graph.node(b).unwrap().dependencies.contains(&a));
        assert!(graph.node(c).unwrap().dependencies.contains(&b));

        assert!(graph.node(a).unwrap().dependents.contains(&b));
        assert!(graph.node(b).unwrap().dependents.contains(&c));
        assert!(graph.node(c).unwrap().dependents.is_empty());
    }

    #[test]
    fn fan_out_and_fan_in() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let merge = NodeId::v4();
        let wf = WorkflowDefinition::new("diamond")
            .with_node(node(a))
            .with_node(node(b))
            .with_node(node(c))
            .with_node(node(merge))
            .with_connection(Connection::new(a, b))
            .with_connection(Connection::new(a, c))
            .with_connection(Connection::new(b, merge))
            .with_connection(Connection::new(c, merge));
        let graph = build_execution_graph(&wf);

        assert_eq!(graph.node(a).unwrap().dependents.len(), 2);

        let merge_entry = graph.node(merge).unwrap();
        assert_eq!(merge_entry.original_dep_count, 2);
        assert_eq!(merge_entry.remaining_deps, 2);
        assert!(merge_entry.dependencies.contains(&b));
        assert!(merge_entry.dependencies.contains(&c));
    }

    #[test]
    fn capability_connection_adds_no_dependency() {
        let provider = NodeId::v4();
        let agent = NodeId::v4();
        let wf = WorkflowDefinition::new("tools")
            .with_node(node(provider))
            .with_node(node_in(agent, NodeCategory::Ai))
            .with_connection(Connection::with_ports(provider, "output", agent, "tools"));
        let graph = build_execution_graph(&wf);

        let agent_entry = graph.node(agent).unwrap();
        assert!(agent_entry.dependencies.is_empty());
        assert_eq!(agent_entry.remaining_deps, 0);
        // Data flow is still tracked so the agent can read its tools.
        assert_eq!(agent_entry.input_connections.len(), 1);
        assert_eq!(agent_entry.input_connections[0].target_port, "tools");

        // The provider is capability-only: excluded from sources.
        assert!(graph.capability_only_nodes.contains(&provider));
        assert_eq!(graph.source_nodes, vec![agent]);
    }

    #[test]
    fn memory_port_is_also_capability() {
        let provider = NodeId::v4();
        let agent = NodeId::v4();
        let wf = WorkflowDefinition::new("memory")
            .with_node(node(provider))
            .with_node(node_in(agent, NodeCategory::Ai))
            .with_connection(Connection::with_ports(provider, "output", agent, "memory"));
        let graph = build_execution_graph(&wf);

        assert!(graph.capability_only_nodes.contains(&provider));
        assert!(graph.node(agent).unwrap().dependencies.is_empty());
    }

    #[test]
    fn mixed_outputs_are_not_capability_only() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let d = NodeId::v4();
        let wf = WorkflowDefinition::new("mixed")
            .with_node(node(a))
            .with_node(node(b))
            .with_node(node(c))
            .with_node(node(d))
            .with_connection(Connection::new(a, b))
            .with_connection(Connection::new(b, c))
            .with_connection(Connection::with_ports(b, "output", d, "tools"));
        let graph = build_execution_graph(&wf);

        // B has one regular output, so it is schedulable.
        assert!(!graph.capability_only_nodes.contains(&b));
        assert!(graph.node(c).unwrap().dependencies.contains(&b));
        // D gains no dependency from the tools edge.
        assert!(graph.node(d).unwrap().dependencies.is_empty());
    }

    #[test]
    fn ui_nodes_classified_by_category() {
        let a = NodeId::v4();
        let panel = NodeId::v4();
        let wf = WorkflowDefinition::new("ui")
            .with_node(node(a))
            .with_node(node_in(panel, NodeCategory::Ui));
        let graph = build_execution_graph(&wf);

        assert!(graph.ui_nodes.contains(&panel));
        assert!(!graph.ui_nodes.contains(&a));
    }

    #[test]
    fn unknown_connection_endpoints_warn_but_do_not_fail() {
        let a = NodeId::v4();
        let ghost = NodeId::v4();
        let wf = WorkflowDefinition::new("dangling")
            .with_node(node(a))
            .with_connection(Connection::new(a, ghost));
        let graph = build_execution_graph(&wf);

        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.node(a).unwrap().output_connections.is_empty());
        assert!(
            graph
                .warnings
                .iter()
                .any(|w| w.contains("unknown target node"))
        );
    }

    #[test]
    fn self_connection_warns_and_adds_no_edge() {
        let a = NodeId::v4();
        let wf = WorkflowDefinition::new("self")
            .with_node(node(a))
            .with_connection(Connection::new(a, a));
        let graph = build_execution_graph(&wf);

        assert!(graph.node(a).unwrap().dependencies.is_empty());
        assert!(graph.warnings.iter().any(|w| w.contains("itself")));
    }

    #[test]
    fn cyclic_workflow_warns_about_missing_sources() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let wf = WorkflowDefinition::new("cycle")
            .with_node(node(a))
            .with_node(node(b))
            .with_connection(Connection::new(a, b))
            .with_connection(Connection::new(b, a));
        let graph = build_execution_graph(&wf);

        assert!(graph.source_nodes.is_empty());
        assert!(
            graph
                .warnings
                .iter()
                .any(|w| w.contains("no source nodes found"))
        );
    }

    #[test]
    fn builder_is_deterministic() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let wf = WorkflowDefinition::new("repeat")
            .with_node(node(a))
            .with_node(node(b))
            .with_node(node(c))
            .with_connection(Connection::new(a, b))
            .with_connection(Connection::new(a, c));

        let first = build_execution_graph(&wf);
        let second = build_execution_graph(&wf);

        assert_eq!(first.source_nodes, second.source_nodes);
        assert_eq!(first.sink_nodes, second.sink_nodes);
        assert_eq!(
            first.nodes.keys().collect::<Vec<_>>(),
            second.nodes.keys().collect::<Vec<_>>()
        );
        for (id, entry) in &first.nodes {
            let other = second.node(*id).unwrap();
            assert_eq!(entry.original_dep_count, other.original_dep_count);
            assert_eq!(
                entry.dependents.iter().collect::<Vec<_>>(),
                other.dependents.iter().collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn multiple_connections_to_same_port_all_tracked() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let merge = NodeId::v4();
        let wf = WorkflowDefinition::new("fan-in")
            .with_node(node(a))
            .with_node(node(b))
            .with_node(node(merge))
            .with_connection(Connection::with_ports(a, "output", merge, "items"))
            .with_connection(Connection::with_ports(b, "output", merge, "items"));
        let graph = build_execution_graph(&wf);

        let entry = graph.node(merge).unwrap();
        assert_eq!(entry.input_connections.len(), 2);
        assert_eq!(entry.original_dep_count, 2);
    }
}
