//! Execution outcomes returned by nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weft_workflow::BranchKey;

use crate::port::PortMap;

/// Branch routing emitted by a decision node.
///
/// The executor prunes every edge whose branch key appears in
/// `blocked_outputs`; dependents reachable only through blocked edges are
/// skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRouting {
    /// The branch that was taken.
    pub active_path: BranchKey,
    /// Branch keys whose edges remain live.
    pub active_outputs: Vec<BranchKey>,
    /// Branch keys whose edges are pruned.
    pub blocked_outputs: Vec<BranchKey>,
}

impl BranchRouting {
    /// Routing for a boolean decision: the taken branch stays live, the
    /// other is blocked.
    #[must_use]
    pub fn binary(decision: bool) -> Self {
        let (active, blocked) = if decision { ("true", "false") } else { ("false", "true") };
        Self {
            active_path: active.to_owned(),
            active_outputs: vec![active.to_owned()],
            blocked_outputs: vec![blocked.to_owned()],
        }
    }

    /// Returns `true` if the given branch is blocked.
    #[must_use]
    pub fn is_blocked(&self, branch: &str) -> bool {
        self.blocked_outputs.iter().any(|b| b == branch)
    }
}

/// A request to pause execution until a human resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRequest {
    /// Unique identifier the external caller uses to resolve this
    /// interaction.
    pub interaction_id: String,
    /// Kind of interaction (e.g. `"approval"`, `"form"`).
    pub kind: String,
    /// When the interaction expires, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Interaction-specific payload shown to the human.
    #[serde(default)]
    pub payload: PortMap,
}

impl InteractionRequest {
    /// Create an interaction request.
    #[must_use]
    pub fn new(interaction_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            interaction_id: interaction_id.into(),
            kind: kind.into(),
            expires_at: None,
            payload: PortMap::new(),
        }
    }

    /// Set the expiry timestamp.
    #[must_use]
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Attach a payload value.
    #[must_use]
    pub fn with_payload(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}

/// What a node produced, carrying both data and flow-control intent.
///
/// The executor matches on this to decide what happens next:
/// - `Success` — outputs flow to dependents
/// - `Decision` — outputs flow, and edges on blocked branches are pruned
/// - `Suspend` — the node parks until an external caller resolves the
///   interaction; dependents stay blocked and no terminal result is
///   recorded yet
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Successful completion with port outputs.
    Success {
        /// Produced port values.
        outputs: PortMap,
    },
    /// A decision was made; some branches are pruned.
    Decision {
        /// Which branches stay live and which are blocked.
        routing: BranchRouting,
        /// Port values produced alongside the decision.
        outputs: PortMap,
    },
    /// Execution pauses until a human resolves the interaction.
    Suspend {
        /// The pending interaction descriptor.
        interaction: InteractionRequest,
    },
}

impl NodeOutcome {
    /// Successful completion.
    #[must_use]
    pub fn success(outputs: PortMap) -> Self {
        Self::Success { outputs }
    }

    /// Successful completion with a single output port.
    #[must_use]
    pub fn single(port: impl Into<String>, value: serde_json::Value) -> Self {
        let mut outputs = PortMap::new();
        outputs.insert(port.into(), value);
        Self::Success { outputs }
    }

    /// A boolean decision with its result value on the active branch port.
    #[must_use]
    pub fn decision(result: bool, outputs: PortMap) -> Self {
        Self::Decision {
            routing: BranchRouting::binary(result),
            outputs,
        }
    }

    /// A human-interaction suspension.
    #[must_use]
    pub fn suspend(interaction: InteractionRequest) -> Self {
        Self::Suspend { interaction }
    }

    /// Returns `true` for `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns `true` for `Suspend`.
    #[must_use]
    pub fn is_suspend(&self) -> bool {
        matches!(self, Self::Suspend { .. })
    }

    /// The decision routing, if this outcome carries one.
    #[must_use]
    pub fn routing(&self) -> Option<&BranchRouting> {
        match self {
            Self::Decision { routing, .. } => Some(routing),
            _ => None,
        }
    }
}
