//! Operation attempt error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum OperationError {
    #[error("operation body failed: {message}")]
    BodyFailed { message: String },

    #[error("operation body panicked: {message}")]
    BodyPanicked { message: String },

    #[error("command failed: {command}: {message}")]
    CommandFailed { command: String, message: String },

    #[error("internal failure in operation {operation}: {message}")]
    InternalFailure { operation: String, message: String },

    #[error("icon unavailable: {message}")]
    IconUnavailable { message: String },
}

impl OperationError {
    /// Convenience constructor used by operation bodies.
    pub fn body_failed(message: impl Into<String>) -> Self {
        Self::BodyFailed {
            message: message.into(),
        }
    }
}

impl UserFacingError for OperationError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::CommandFailed { .. } => {
                Some("Inspect the operation output, then retry with a different retry mode.")
            }
            Self::BodyPanicked { .. } | Self::InternalFailure { .. } => {
                Some("This is a bug; the operation log contains the details.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::BodyFailed { .. } | Self::CommandFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::BodyFailed { .. } => "operation.body_failed",
            Self::BodyPanicked { .. } => "operation.body_panicked",
            Self::CommandFailed { .. } => "operation.command_failed",
            Self::InternalFailure { .. } => "operation.internal_failure",
            Self::IconUnavailable { .. } => "operation.icon_unavailable",
        })
    }
}
