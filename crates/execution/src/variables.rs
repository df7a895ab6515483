//! Shared variable namespace for a run.

use serde::{Deserialize, Serialize};
use weft_node::PortMap;

/// Reserved key under which node-shared bindings appear in snapshots.
pub const NODES_NAMESPACE: &str = "_nodes";

/// The run's variable namespace, split into user-space bindings and
/// node-shared bindings.
///
/// Keeping the two maps separate makes the reserved `_nodes` namespace a
/// structural fact instead of a naming convention: user variables can
/// never collide with shared node outputs, and the flattening rule is a
/// total function over `PortMap`s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableStore {
    /// User-space variables (workflow defaults, trigger data, values set
    /// by nodes at runtime).
    #[serde(default)]
    user: serde_json::Map<String, serde_json::Value>,
    /// Node outputs published under stable keys.
    #[serde(default)]
    nodes: serde_json::Map<String, serde_json::Value>,
}

impl VariableStore {
    /// Create a store seeded with initial user variables.
    #[must_use]
    pub fn with_initial(initial: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            user: initial,
            nodes: serde_json::Map::new(),
        }
    }

    /// Set a user variable.
    pub fn set(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.user.insert(name.into(), value);
    }

    /// Get a user variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.user.get(name)
    }

    /// Get a shared node binding.
    #[must_use]
    pub fn get_node(&self, key: &str) -> Option<&serde_json::Value> {
        self.nodes.get(key)
    }

    /// Resolve a dotted path (`"weather.temperature"`) against the merged
    /// view: user variables first, then node-shared bindings, with an
    /// explicit `_nodes.` prefix also accepted.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> Option<&serde_json::Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;

        let mut current = if first == NODES_NAMESPACE {
            let key = segments.next()?;
            self.nodes.get(key)?
        } else {
            self.user
                .get(first)
                .or_else(|| self.nodes.get(first))?
        };

        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Publish a node's outputs under a stable key.
    ///
    /// Flattening rule: single-port outputs publish the port's value
    /// directly under the key (so `key.field` addresses into a mapping
    /// value, and scalars sit at `key` itself); multi-port outputs keep
    /// their port structure. Publishing the same outputs twice yields the
    /// same binding.
    pub fn share_node_outputs(&mut self, key: impl Into<String>, outputs: &PortMap) {
        let value = if outputs.len() == 1 {
            outputs
                .values()
                .next()
                .cloned()
                .unwrap_or(serde_json::Value::Null)
        } else {
            serde_json::Value::Object(outputs.clone())
        };
        self.nodes.insert(key.into(), value);
    }

    /// Merged snapshot handed to nodes: user variables at the top level,
    /// node-shared bindings under [`NODES_NAMESPACE`].
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut merged = self.user.clone();
        merged.insert(
            NODES_NAMESPACE.to_owned(),
            serde_json::Value::Object(self.nodes.clone()),
        );
        merged
    }

    /// Number of user variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.user.len()
    }

    /// Returns `true` if no user variables are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_and_get() {
        let mut store = VariableStore::default();
        assert!(store.get("count").is_none());

        store.set("count", serde_json::json!(42));
        assert_eq!(store.get("count"), Some(&serde_json::json!(42)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn initial_variables() {
        let mut initial = serde_json::Map::new();
        initial.insert("region".into(), serde_json::json!("eu"));
        let store = VariableStore::with_initial(initial);
        assert_eq!(store.get("region"), Some(&serde_json::json!("eu")));
    }

    #[test]
    fn single_mapping_port_flattens() {
        let mut store = VariableStore::default();
        let mut outputs = PortMap::new();
        outputs.insert(
            "output".into(),
            serde_json::json!({"temperature": 21, "unit": "C"}),
        );
        store.share_node_outputs("weather", &outputs);

        // The mapping is addressable field by field under the key.
        assert_eq!(
            store.resolve_path("weather.temperature"),
            Some(&serde_json::json!(21))
        );
        assert_eq!(
            store.get_node("weather"),
            Some(&serde_json::json!({"temperature": 21, "unit": "C"}))
        );
    }

    #[test]
    fn single_scalar_port_stores_scalar() {
        let mut store = VariableStore::default();
        let mut outputs = PortMap::new();
        outputs.insert("output".into(), serde_json::json!(42));
        store.share_node_outputs("answer", &outputs);

        assert_eq!(store.get_node("answer"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn multi_port_preserves_port_structure() {
        let mut store = VariableStore::default();
        let mut outputs = PortMap::new();
        outputs.insert("body".into(), serde_json::json!("text"));
        outputs.insert("status".into(), serde_json::json!(200));
        store.share_node_outputs("response", &outputs);

        assert_eq!(
            store.resolve_path("response.status"),
            Some(&serde_json::json!(200))
        );
        assert_eq!(
            store.resolve_path("response.body"),
            Some(&serde_json::json!("text"))
        );
    }

    #[test]
    fn sharing_is_idempotent() {
        let mut store = VariableStore::default();
        let mut outputs = PortMap::new();
        outputs.insert("output".into(), serde_json::json!({"a": 1}));

        store.share_node_outputs("k", &outputs);
        let first = store.get_node("k").cloned();
        store.share_node_outputs("k", &outputs);
        assert_eq!(store.get_node("k").cloned(), first);
    }

    #[test]
    fn user_variables_shadow_node_bindings_in_paths() {
        let mut store = VariableStore::default();
        store.set("result", serde_json::json!("user"));
        let mut outputs = PortMap::new();
        outputs.insert("output".into(), serde_json::json!("node"));
        store.share_node_outputs("result", &outputs);

        assert_eq!(store.resolve_path("result"), Some(&serde_json::json!("user")));
        // The explicit prefix reaches the node binding.
        assert_eq!(
            store.resolve_path("_nodes.result"),
            Some(&serde_json::json!("node"))
        );
    }

    #[test]
    fn snapshot_nests_nodes_namespace() {
        let mut store = VariableStore::default();
        store.set("trigger_data", serde_json::json!({"event": "tick"}));
        let mut outputs = PortMap::new();
        outputs.insert("output".into(), serde_json::json!(1));
        store.share_node_outputs("counter", &outputs);

        let snapshot = store.snapshot();
        assert_eq!(snapshot["trigger_data"]["event"], serde_json::json!("tick"));
        assert_eq!(snapshot[NODES_NAMESPACE]["counter"], serde_json::json!(1));
    }

    #[test]
    fn resolve_missing_path() {
        let store = VariableStore::default();
        assert!(store.resolve_path("missing").is_none());
        assert!(store.resolve_path("missing.deeper").is_none());
        assert!(store.resolve_path("_nodes.missing").is_none());
    }
}
