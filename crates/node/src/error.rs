//! Node error types.

use std::time::Duration;

/// Error returned by node execution.
///
/// Distinguishes retryable from fatal failures so the engine can apply its
/// retry policy without the node knowing about backoff configuration.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum NodeError {
    /// Transient failure. The engine may retry within its budget.
    #[error("retryable: {error}")]
    Retryable {
        /// Human-readable error message.
        error: String,
        /// Suggested delay before retry; the engine may override it.
        backoff_hint: Option<Duration>,
    },

    /// Permanent failure. Never retried.
    #[error("fatal: {error}")]
    Fatal {
        /// Human-readable error message.
        error: String,
    },

    /// Input or configuration validation failed before execution began.
    #[error("validation: {0}")]
    Validation(String),

    /// Execution cancelled via the cancellation token.
    #[error("cancelled")]
    Cancelled,
}

impl NodeError {
    /// Create a retryable error.
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable {
            error: msg.into(),
            backoff_hint: None,
        }
    }

    /// Create a retryable error with a suggested backoff.
    pub fn retryable_with_backoff(msg: impl Into<String>, backoff: Duration) -> Self {
        Self::Retryable {
            error: msg.into(),
            backoff_hint: Some(backoff),
        }
    }

    /// Create a fatal error.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal { error: msg.into() }
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns `true` if the engine should consider retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// Extract the backoff hint, if present.
    #[must_use]
    pub fn backoff_hint(&self) -> Option<Duration> {
        match self {
            Self::Retryable { backoff_hint, .. } => *backoff_hint,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        let err = NodeError::retryable("connection reset");
        assert!(err.is_retryable());
        assert!(err.backoff_hint().is_none());
    }

    #[test]
    fn retryable_backoff_hint() {
        let err = NodeError::retryable_with_backoff("rate limited", Duration::from_secs(5));
        assert!(err.is_retryable());
        assert_eq!(err.backoff_hint(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn fatal_is_not_retryable() {
        assert!(!NodeError::fatal("bad credentials").is_retryable());
        assert!(!NodeError::validation("missing field").is_retryable());
        assert!(!NodeError::Cancelled.is_retryable());
    }

    #[test]
    fn display_formatting() {
        assert_eq!(NodeError::retryable("timeout").to_string(), "retryable: timeout");
        assert_eq!(NodeError::fatal("bad schema").to_string(), "fatal: bad schema");
        assert_eq!(
            NodeError::validation("url is required").to_string(),
            "validation: url is required"
        );
        assert_eq!(NodeError::Cancelled.to_string(), "cancelled");
    }
}
