//! Operation log lines

use serde::{Deserialize, Serialize};

/// Kind of an operation log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Describes what the operation is doing
    Info,
    /// Transient status text; delivered to observers, never retained
    Progress,
    StandardOutput,
    StandardError,
}

impl LineKind {
    /// Whether lines of this kind are kept in the replayable log.
    #[must_use]
    pub fn is_retained(self) -> bool {
        !matches!(self, Self::Progress)
    }
}

/// A single line of operation output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub text: String,
    pub kind: LineKind,
}

impl LogLine {
    pub fn new(text: impl Into<String>, kind: LineKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}
