//! Execution and time modes.

use serde::{Deserialize, Serialize};

/// How a run schedules its nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Independent nodes run concurrently (the default).
    #[default]
    Parallel,
    /// One node at a time, in deterministic topological order.
    Sequential,
    /// Nodes are not executed; each produces a placeholder result.
    DryRun,
    /// Parallel scheduling against the virtual clock.
    Simulation,
}

/// How a run tells time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeMode {
    /// Standard wall-clock time.
    #[default]
    RealTime,
    /// Simulated time advanced explicitly by simulation nodes.
    Virtual,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parallel => write!(f, "parallel"),
            Self::Sequential => write!(f, "sequential"),
            Self::DryRun => write!(f, "dry_run"),
            Self::Simulation => write!(f, "simulation"),
        }
    }
}
