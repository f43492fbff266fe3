//! Operation status and attempt verdicts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Waiting for admission (initial state)
    #[default]
    InQueue,
    /// Admitted; the operation body is executing
    Running,
    /// The body reported success
    Succeeded,
    /// The body reported failure, or the lifecycle failed internally
    Failed,
    /// Canceled by request
    Canceled,
}

impl OperationStatus {
    /// Whether the operation is waiting or running.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::InQueue | Self::Running)
    }

    /// Whether no further transition happens without a retry.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InQueue => write!(f, "in queue"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Outcome reported by an operation body for a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure,
    Canceled,
    /// Run the body again without going back through admission
    AutoRetry,
}

impl Verdict {
    /// Terminal status this verdict maps to; `None` for [`Verdict::AutoRetry`].
    #[must_use]
    pub fn terminal_status(self) -> Option<OperationStatus> {
        match self {
            Self::Success => Some(OperationStatus::Succeeded),
            Self::Failure => Some(OperationStatus::Failed),
            Self::Canceled => Some(OperationStatus::Canceled),
            Self::AutoRetry => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Canceled => write!(f, "canceled"),
            Self::AutoRetry => write!(f, "auto-retry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_is_in_queue() {
        assert_eq!(OperationStatus::default(), OperationStatus::InQueue);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OperationStatus::Succeeded.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
        assert!(OperationStatus::Canceled.is_terminal());
        assert!(OperationStatus::InQueue.is_active());
        assert!(OperationStatus::Running.is_active());
    }

    #[test]
    fn test_verdict_mapping() {
        assert_eq!(
            Verdict::Success.terminal_status(),
            Some(OperationStatus::Succeeded)
        );
        assert_eq!(
            Verdict::Failure.terminal_status(),
            Some(OperationStatus::Failed)
        );
        assert_eq!(
            Verdict::Canceled.terminal_status(),
            Some(OperationStatus::Canceled)
        );
        assert_eq!(Verdict::AutoRetry.terminal_status(), None);
    }
}
