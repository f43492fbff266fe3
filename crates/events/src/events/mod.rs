use serde::{Deserialize, Serialize};

use crate::{EventLevel, EventSource};
use opsched_errors::UserFacingError;

/// Structured failure information attached to failure events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod general;
pub mod operation;
pub mod queue;

pub use general::*;
pub use operation::*;
pub use queue::*;

/// Top-level application event enum that aggregates all domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, debug logs)
    General(GeneralEvent),

    /// Per-operation lifecycle and log events
    Operation(OperationEvent),

    /// Admission queue membership changes
    Queue(QueueEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::General,
            Self::Operation(_) => EventSource::Operation,
            Self::Queue(_) => EventSource::Queue,
        }
    }

    /// Operation this event belongs to, if any
    #[must_use]
    pub fn correlation_id(&self) -> Option<String> {
        match self {
            Self::General(_) => None,
            Self::Operation(event) => Some(event.operation().to_string()),
            Self::Queue(event) => event.operation().map(|id| id.to_string()),
        }
    }

    /// Severity of this event
    #[must_use]
    pub fn event_level(&self) -> EventLevel {
        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Operation(OperationEvent::Failed { .. }) => EventLevel::Error,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Operation(OperationEvent::LogLineAdded {
                kind: opsched_types::LineKind::StandardError,
                ..
            }) => EventLevel::Warn,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Queue(_)
            | Self::Operation(
                OperationEvent::StatusChanged { .. }
                | OperationEvent::BadgesChanged { .. }
                | OperationEvent::LogLineAdded { .. },
            ) => EventLevel::Debug,

            _ => EventLevel::Info,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        self.event_level().into()
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "opsched::events::general",
            Self::Operation(_) => "opsched::events::operation",
            Self::Queue(_) => "opsched::events::queue",
        }
    }
}
