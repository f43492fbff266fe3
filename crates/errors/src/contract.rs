//! Caller contract violations

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// A programming-contract violation by the caller of the scheduler API.
///
/// These are never retryable: the same call with the same arguments will
/// fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ContractError {
    #[error("metadata field `{field}` was not set")]
    MissingMetadata { field: String },

    #[error("operation {operation} is already on the queue")]
    AlreadyQueued { operation: String },

    #[error("operation {operation} is already running or queued")]
    AlreadyActive { operation: String },

    #[error("retry requested without a retry mode")]
    NoRetryMode,

    #[error("unknown retry mode: {token}")]
    UnknownRetryMode { token: String },
}

impl UserFacingError for ContractError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingMetadata { .. } => {
                Some("Fill in every metadata field before running the operation.")
            }
            Self::AlreadyQueued { .. } | Self::AlreadyActive { .. } => {
                Some("Wait for the operation to finish before running it again.")
            }
            Self::NoRetryMode | Self::UnknownRetryMode { .. } => Some(
                "Use one of Retry, RetryAsAdmin, RetryInteractive or RetryNoHashCheck.",
            ),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::MissingMetadata { .. } => "contract.missing_metadata",
            Self::AlreadyQueued { .. } => "contract.already_queued",
            Self::AlreadyActive { .. } => "contract.already_active",
            Self::NoRetryMode => "contract.no_retry_mode",
            Self::UnknownRetryMode { .. } => "contract.unknown_retry_mode",
        })
    }
}
