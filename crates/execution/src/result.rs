//! Terminal result of one node within a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weft_core::NodeId;
use weft_node::PortMap;

/// Result of executing (or skipping) a single node.
///
/// Written exactly once per node per run. Skipped nodes carry the
/// `skipped` marker and no outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRunResult {
    /// The node this result belongs to.
    pub node_id: NodeId,
    /// Whether the node completed successfully.
    pub success: bool,
    /// Produced port values (empty on failure or skip).
    #[serde(default)]
    pub outputs: PortMap,
    /// Error message when the node failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the first attempt started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the node reached this terminal result.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration across all attempts.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Number of retries performed (0 = first attempt succeeded).
    #[serde(default)]
    pub retry_count: u32,
    /// The node was skipped by branch pruning or cancellation.
    #[serde(default)]
    pub skipped: bool,
    /// Free-form result metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NodeRunResult {
    /// A successful result with outputs.
    #[must_use]
    pub fn succeeded(node_id: NodeId, outputs: PortMap) -> Self {
        Self {
            node_id,
            success: true,
            outputs,
            error: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            retry_count: 0,
            skipped: false,
            metadata: serde_json::Map::new(),
        }
    }

    /// A failed result with an error message.
    #[must_use]
    pub fn failed(node_id: NodeId, error: impl Into<String>) -> Self {
        Self {
            node_id,
            success: false,
            outputs: PortMap::new(),
            error: Some(error.into()),
            started_at: None,
            completed_at: None,
            duration_ms: None,
            retry_count: 0,
            skipped: false,
            metadata: serde_json::Map::new(),
        }
    }

    /// A pseudo-result for a node skipped by pruning or cancellation.
    #[must_use]
    pub fn skipped(node_id: NodeId, reason: impl Into<String>) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("reason".into(), serde_json::Value::String(reason.into()));
        Self {
            node_id,
            success: false,
            outputs: PortMap::new(),
            error: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            retry_count: 0,
            skipped: true,
            metadata,
        }
    }

    /// Record attempt timing.
    #[must_use]
    pub fn with_timing(mut self, started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self.completed_at = Some(completed_at);
        self.duration_ms = Some(
            (completed_at - started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self
    }

    /// Record the retry count.
    #[must_use]
    pub fn with_retries(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}
