//! Operation identity and human-readable metadata

use opsched_errors::ContractError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, process-unique operation identifier.
///
/// Only used for correlation; never for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Allocate a fresh identifier
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strings an operation must carry before it may run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// "Installation of X"
    pub title: String,
    /// "X is being installed"
    pub status: String,
    /// "X was installed"
    pub success_title: String,
    /// "X has been installed successfully"
    pub success_message: String,
    /// "X could not be installed"
    pub failure_title: String,
    /// "X could not be installed: see the log for details"
    pub failure_message: String,
    /// "Starting operation X with options Y"
    pub operation_information: String,
}

impl OperationMetadata {
    /// Check that every field is filled in.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::MissingMetadata`] naming the first empty field.
    pub fn validate(&self) -> Result<(), ContractError> {
        let fields = [
            ("status", &self.status),
            ("title", &self.title),
            ("operation_information", &self.operation_information),
            ("success_title", &self.success_title),
            ("success_message", &self.success_message),
            ("failure_title", &self.failure_title),
            ("failure_message", &self.failure_message),
        ];

        match fields.iter().find(|(_, value)| value.is_empty()) {
            Some((field, _)) => Err(ContractError::MissingMetadata {
                field: (*field).to_string(),
            }),
            None => Ok(()),
        }
    }
}
