use serde::{Deserialize, Serialize};

use opsched_types::OperationId;

/// Admission queue membership changes.
///
/// Every membership event carries the queue order right after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    Entered {
        operation: OperationId,
        position: usize,
        snapshot: Vec<OperationId>,
    },

    Removed {
        operation: OperationId,
        snapshot: Vec<OperationId>,
    },

    /// Repositioned by a reordering primitive
    Moved {
        operation: OperationId,
        position: usize,
        snapshot: Vec<OperationId>,
    },

    LimitChanged { max_concurrent: usize },
}

impl QueueEvent {
    #[must_use]
    pub fn operation(&self) -> Option<OperationId> {
        match self {
            Self::Entered { operation, .. }
            | Self::Removed { operation, .. }
            | Self::Moved { operation, .. } => Some(*operation),
            Self::LimitChanged { .. } => None,
        }
    }
}
