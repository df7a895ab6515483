//! Global execution settings with environment overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use weft_workflow::ExecutionOverrides;

use crate::executor::ExecutorConfig;

/// Process-wide execution settings.
///
/// Defaults are the built-in fallbacks; deployments override them via
/// configuration files deserialized into this struct or via
/// `WEFT_EXECUTION_*` environment variables. Per-workflow
/// [`ExecutionOverrides`] win over these values when merging into an
/// [`ExecutorConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Cap on concurrently running executions per workflow.
    pub max_concurrent_runs_per_workflow: usize,
    /// Capacity of each workflow's pending trigger-event queue.
    pub max_queue_depth_per_workflow: usize,
    /// Default cap on concurrently executing nodes per run.
    pub default_max_concurrent_nodes: usize,
    /// Default cap on concurrently executing LLM / AI nodes per run.
    pub ai_concurrent_limit: usize,
    /// Default per-node timeout, in seconds.
    pub default_timeout_seconds: u64,
    /// Default retry budget per node.
    pub max_retries: u32,
    /// Default base delay before the first retry, in milliseconds.
    pub retry_delay_ms: u64,
    /// Default exponential backoff multiplier.
    pub backoff_multiplier: f64,
    /// Default ceiling on the computed retry delay, in milliseconds.
    pub max_retry_delay_ms: u64,
    /// Whether a node failure cancels the run by default.
    pub stop_on_error: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_concurrent_runs_per_workflow: 5,
            max_queue_depth_per_workflow: 200,
            default_max_concurrent_nodes: 5,
            ai_concurrent_limit: 2,
            default_timeout_seconds: 300,
            max_retries: 3,
            retry_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_retry_delay_ms: 10_000,
            stop_on_error: true,
        }
    }
}

impl ExecutionSettings {
    /// Load settings from the environment, falling back to defaults.
    ///
    /// Recognized variables mirror the field names:
    /// `WEFT_EXECUTION_MAX_CONCURRENT_RUNS_PER_WORKFLOW`,
    /// `WEFT_EXECUTION_MAX_QUEUE_DEPTH_PER_WORKFLOW`,
    /// `WEFT_EXECUTION_DEFAULT_MAX_CONCURRENT_NODES`,
    /// `WEFT_EXECUTION_AI_CONCURRENT_LIMIT`,
    /// `WEFT_EXECUTION_DEFAULT_TIMEOUT_SECONDS`,
    /// `WEFT_EXECUTION_MAX_RETRIES`, `WEFT_EXECUTION_STOP_ON_ERROR`.
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        read_env(
            "WEFT_EXECUTION_MAX_CONCURRENT_RUNS_PER_WORKFLOW",
            &mut settings.max_concurrent_runs_per_workflow,
        );
        read_env(
            "WEFT_EXECUTION_MAX_QUEUE_DEPTH_PER_WORKFLOW",
            &mut settings.max_queue_depth_per_workflow,
        );
        read_env(
            "WEFT_EXECUTION_DEFAULT_MAX_CONCURRENT_NODES",
            &mut settings.default_max_concurrent_nodes,
        );
        read_env(
            "WEFT_EXECUTION_AI_CONCURRENT_LIMIT",
            &mut settings.ai_concurrent_limit,
        );
        read_env(
            "WEFT_EXECUTION_DEFAULT_TIMEOUT_SECONDS",
            &mut settings.default_timeout_seconds,
        );
        read_env("WEFT_EXECUTION_MAX_RETRIES", &mut settings.max_retries);
        read_env("WEFT_EXECUTION_STOP_ON_ERROR", &mut settings.stop_on_error);
        settings
    }

    /// Merge these settings with a workflow's overrides into the concrete
    /// per-run executor configuration. Workflow values win, then settings,
    /// then built-in defaults (already folded into `self`).
    #[must_use]
    pub fn executor_config(&self, overrides: &ExecutionOverrides) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrent_nodes: overrides
                .max_concurrent_nodes
                .unwrap_or(self.default_max_concurrent_nodes),
            ai_concurrent_limit: overrides
                .ai_concurrent_limit
                .unwrap_or(self.ai_concurrent_limit),
            default_timeout: overrides
                .default_timeout
                .unwrap_or(Duration::from_secs(self.default_timeout_seconds)),
            workflow_timeout: overrides.workflow_timeout,
            stop_on_error: overrides.stop_on_error.unwrap_or(self.stop_on_error),
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            retry_delay: overrides
                .retry_delay
                .unwrap_or(Duration::from_millis(self.retry_delay_ms)),
            backoff_multiplier: overrides
                .backoff_multiplier
                .unwrap_or(self.backoff_multiplier),
            max_retry_delay: overrides
                .max_retry_delay
                .unwrap_or(Duration::from_millis(self.max_retry_delay_ms)),
        }
    }

    /// Admission cap for a workflow: its override, else the global
    /// setting.
    #[must_use]
    pub fn max_concurrent_runs(&self, overrides: &ExecutionOverrides) -> usize {
        overrides
            .max_concurrent_runs
            .unwrap_or(self.max_concurrent_runs_per_workflow)
    }
}

fn read_env<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(variable = name, value = %raw, "ignoring unparseable setting"),
        }
    }
}
