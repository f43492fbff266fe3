use serde::{Deserialize, Serialize};

use super::FailureContext;
use opsched_types::{BadgeSet, LineKind, OperationId, OperationStatus};

/// Events raised by a single operation over its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperationEvent {
    /// Raised on every status assignment, including redundant ones
    StatusChanged {
        operation: OperationId,
        status: OperationStatus,
    },

    /// `cancel()` was called while the body was running
    CancelRequested { operation: OperationId },

    /// A log line was added (Progress lines are not retained)
    LogLineAdded {
        operation: OperationId,
        text: String,
        kind: LineKind,
    },

    /// The operation was admitted and its body is about to run
    Starting { operation: OperationId },

    /// The lifecycle pass finished, whatever the outcome
    Finished { operation: OperationId },

    /// The operation entered the admission queue
    Enqueued { operation: OperationId },

    Succeeded { operation: OperationId },

    Failed {
        operation: OperationId,
        failure: Option<FailureContext>,
    },

    /// Capability snapshot changed
    BadgesChanged {
        operation: OperationId,
        badges: BadgeSet,
    },
}

impl OperationEvent {
    /// Operation that raised this event
    #[must_use]
    pub fn operation(&self) -> OperationId {
        match self {
            Self::StatusChanged { operation, .. }
            | Self::CancelRequested { operation }
            | Self::LogLineAdded { operation, .. }
            | Self::Starting { operation }
            | Self::Finished { operation }
            | Self::Enqueued { operation }
            | Self::Succeeded { operation }
            | Self::Failed { operation, .. }
            | Self::BadgesChanged { operation, .. } => *operation,
        }
    }
}
