//! Validated status transitions.
//!
//! Status transitions are monotonic: once a run leaves a state it never
//! returns except for the `Running ↔ Paused` pair, and terminal states
//! accept no transitions at all.

use crate::error::ExecutionError;
use crate::status::ExecutionStatus;

/// Check that a status transition is legal.
pub fn validate_transition(
    from: ExecutionStatus,
    to: ExecutionStatus,
) -> Result<(), ExecutionError> {
    use ExecutionStatus as S;

    let allowed = match from {
        S::Pending => matches!(to, S::Running | S::Failed | S::Cancelled | S::Stopped),
        S::Running => matches!(
            to,
            S::Paused
                | S::Completed
                | S::CompletedWithErrors
                | S::Failed
                | S::Cancelled
                | S::Stopped
        ),
        S::Paused => matches!(to, S::Running | S::Failed | S::Cancelled | S::Stopped),
        // Terminal states are final.
        S::Completed | S::CompletedWithErrors | S::Failed | S::Stopped | S::Cancelled => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ExecutionError::invalid_transition(from, to))
    }
}
