//! Run-level status tracking.

use serde::{Deserialize, Serialize};

/// The overall status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created or activated, not yet running.
    Pending,
    /// Actively running nodes (or suspended on a human interaction).
    Running,
    /// Paused by the user; in-flight nodes drain, no new dispatches.
    Paused,
    /// Every scheduled node completed successfully.
    Completed,
    /// The run finished, but at least one node failed.
    CompletedWithErrors,
    /// The run was aborted by a failure under `stop_on_error`.
    Failed,
    /// Monitoring was deactivated.
    Stopped,
    /// The run was cancelled by an external request.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns `true` if the execution has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed
                | Self::CompletedWithErrors
                | Self::Failed
                | Self::Stopped
                | Self::Cancelled
        )
    }

    /// Returns `true` if the execution may still make progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Returns `true` if the run finished without aborting, possibly with
    /// node-level failures.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::CompletedWithErrors)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithErrors => write!(f, "completed_with_errors"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn terminal_states() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::CompletedWithErrors.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Stopped.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());

        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Paused.is_terminal());
    }

    #[test]
    fn active_states() {
        assert!(ExecutionStatus::Running.is_active());
        assert!(ExecutionStatus::Paused.is_active());
        assert!(!ExecutionStatus::Pending.is_active());
        assert!(!ExecutionStatus::Completed.is_active());
    }

    #[test]
    fn finished_states() {
        assert!(ExecutionStatus::Completed.is_finished());
        assert!(ExecutionStatus::CompletedWithErrors.is_finished());
        assert!(!ExecutionStatus::Failed.is_finished());
        assert!(!ExecutionStatus::Cancelled.is_finished());
    }

    #[test]
    fn display_matches_serde() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Paused,
            ExecutionStatus::Completed,
            ExecutionStatus::CompletedWithErrors,
            ExecutionStatus::Failed,
            ExecutionStatus::Stopped,
            ExecutionStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
            let back: ExecutionStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }
}
