//! Per-workflow overrides of the runtime execution budget.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Partial overrides of the runtime budget carried on a workflow definition.
///
/// Every field is optional; absent fields fall back to the engine's global
/// settings, then to built-in defaults. Unknown keys round-trip through
/// `extra` so the definition format stays forward-compatible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOverrides {
    /// Cap on concurrently executing nodes in the standard pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_nodes: Option<usize>,
    /// Cap on concurrently executing LLM / AI nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_concurrent_limit: Option<usize>,
    /// Default per-node timeout.
    #[serde(default, with = "crate::serde_ms::opt", skip_serializing_if = "Option::is_none")]
    pub default_timeout: Option<Duration>,
    /// Overall wall-clock budget for a run.
    #[serde(default, with = "crate::serde_ms::opt", skip_serializing_if = "Option::is_none")]
    pub workflow_timeout: Option<Duration>,
    /// Cancel the run on the first node failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_on_error: Option<bool>,
    /// Retry budget per node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Base delay before the first retry.
    #[serde(default, with = "crate::serde_ms::opt", skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<Duration>,
    /// Exponential backoff multiplier applied per attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_multiplier: Option<f64>,
    /// Ceiling on the computed retry delay.
    #[serde(default, with = "crate::serde_ms::opt", skip_serializing_if = "Option::is_none")]
    pub max_retry_delay: Option<Duration>,
    /// Cap on concurrently running executions of this workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_runs: Option<usize>,
    /// Additional keys copied through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
