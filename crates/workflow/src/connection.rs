//! Directed connections between node ports.

use serde::{Deserialize, Serialize};
use weft_core::NodeId;

/// Key naming an output or input port (e.g. `"output"`, `"input"`, `"tools"`).
pub type PortKey = String;

/// Key naming a decision branch (e.g. `"true"`, `"false"`).
pub type BranchKey = String;

/// Target ports that carry data without imposing execution order.
///
/// A connection into one of these ports makes the source node's output
/// available to the target (a tool or memory provider for an agent) but
/// does not make the target wait for the source to run.
pub const CAPABILITY_PORTS: [&str; 2] = ["tools", "memory"];

/// A directed edge from a source port on one node to a target port on another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Node producing the value.
    pub source_node_id: NodeId,
    /// Output port on the source node.
    pub source_port: PortKey,
    /// Node consuming the value.
    pub target_node_id: NodeId,
    /// Input port on the target node.
    pub target_port: PortKey,
    /// Optional decision-branch discriminant for this edge.
    ///
    /// When absent, the branch is derived from the source port name
    /// (see [`branch_key`](Self::branch_key)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchKey>,
}

impl Connection {
    /// Create a connection with the default `"output"` → `"input"` ports.
    #[must_use]
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self::with_ports(source, "output", target, "input")
    }

    /// Create a connection between explicitly named ports.
    #[must_use]
    pub fn with_ports(
        source: NodeId,
        source_port: impl Into<PortKey>,
        target: NodeId,
        target_port: impl Into<PortKey>,
    ) -> Self {
        Self {
            source_node_id: source,
            source_port: source_port.into(),
            target_node_id: target,
            target_port: target_port.into(),
            branch: None,
        }
    }

    /// Attach an explicit branch discriminant.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<BranchKey>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Returns `true` if this connection targets a capability port.
    ///
    /// Capability connections are tracked for data flow but add no
    /// execution-order dependency.
    #[must_use]
    pub fn is_capability(&self) -> bool {
        CAPABILITY_PORTS.contains(&self.target_port.as_str())
    }

    /// Resolve the branch this edge belongs to for decision routing.
    ///
    /// Precedence: the explicit `branch` field, then the source port name
    /// when it is a branch key (`"true"` / `"false"`), then `"true"`.
    #[must_use]
    pub fn branch_key(&self) -> BranchKey {
        if let Some(branch) = &self.branch {
            return branch.clone();
        }
        if self.source_port == "true" || self.source_port == "false" {
            return self.source_port.clone();
        }
        "true".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_ports() {
        let conn = Connection::new(NodeId::v4(), NodeId::v4());
        assert_eq!(conn.source_port, "output");
        assert_eq!(conn.target_port, "input");
        assert!(conn.branch.is_none());
    }

    #[test]
    fn capability_detection() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        assert!(Connection::with_ports(a, "output", b, "tools").is_capability());
        assert!(Connection::with_ports(a, "output", b, "memory").is_capability());
        assert!(!Connection::with_ports(a, "output", b, "input").is_capability());
        // Only the target port matters.
        assert!(!Connection::with_ports(a, "tools", b, "input").is_capability());
    }

    #[test]
    fn branch_from_explicit_field() {
        let conn = Connection::new(NodeId::v4(), NodeId::v4()).with_branch("false");
        assert_eq!(conn.branch_key(), "false");
    }

    #[test]
    fn branch_from_port_name() {
        let conn = Connection::with_ports(NodeId::v4(), "false", NodeId::v4(), "input");
        assert_eq!(conn.branch_key(), "false");
        let conn = Connection::with_ports(NodeId::v4(), "true", NodeId::v4(), "input");
        assert_eq!(conn.branch_key(), "true");
    }

    #[test]
    fn branch_defaults_to_true() {
        let conn = Connection::new(NodeId::v4(), NodeId::v4());
        assert_eq!(conn.branch_key(), "true");
    }

    #[test]
    fn explicit_branch_wins_over_port_name() {
        let conn =
            Connection::with_ports(NodeId::v4(), "true", NodeId::v4(), "input").with_branch("false");
        assert_eq!(conn.branch_key(), "false");
    }

    #[test]
    fn serde_round_trip() {
        let conn = Connection::new(NodeId::v4(), NodeId::v4()).with_branch("true");
        let json = serde_json::to_string(&conn).unwrap();
        let back: Connection = serde_json::from_str(&json).unwrap();
        assert_eq!(conn, back);
    }

    #[test]
    fn serde_omits_absent_branch() {
        let conn = Connection::new(NodeId::v4(), NodeId::v4());
        let json = serde_json::to_value(&conn).unwrap();
        assert!(json.get("branch").is_none());
    }
}
