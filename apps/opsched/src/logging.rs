//! Structured logging integration for events
//!
//! Converts received events into tracing records with structured fields so
//! that `--json` output and `RUST_LOG` filtering see the same data the
//! terminal renderer does.

use opsched_events::{AppEvent, EventMessage, GeneralEvent, OperationEvent, QueueEvent};
use tracing::{debug, error, info, warn};

/// Log an `AppEvent` using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let event = &message.event;
    let meta = &message.meta;

    match event {
        AppEvent::Operation(operation_event) => match operation_event {
            OperationEvent::StatusChanged { operation, status } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    status = %status,
                    "Operation status changed"
                );
            }
            OperationEvent::LogLineAdded {
                operation,
                text,
                kind,
            } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    kind = ?kind,
                    text = %text,
                    "Operation output"
                );
            }
            OperationEvent::Enqueued { operation } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    "Operation enqueued"
                );
            }
            OperationEvent::Starting { operation } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    "Operation starting"
                );
            }
            OperationEvent::CancelRequested { operation } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    "Operation cancel requested"
                );
            }
            OperationEvent::Finished { operation } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    "Operation finished"
                );
            }
            OperationEvent::Succeeded { operation } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    "Operation succeeded"
                );
            }
            OperationEvent::Failed { operation, failure } => {
                if let Some(failure) = failure {
                    error!(
                        source = meta.source.as_str(),
                        event_id = %meta.event_id,
                        operation = %operation,
                        retryable = failure.retryable,
                        code = ?failure.code,
                        message = %failure.message,
                        hint = ?failure.hint,
                        "Operation failed"
                    );
                } else {
                    error!(
                        source = meta.source.as_str(),
                        event_id = %meta.event_id,
                        operation = %operation,
                        "Operation failed"
                    );
                }
            }
            OperationEvent::BadgesChanged { operation, badges } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    as_administrator = badges.as_administrator,
                    interactive = badges.interactive,
                    skip_integrity_check = badges.skip_integrity_check,
                    scope = ?badges.scope,
                    "Operation capabilities changed"
                );
            }
        },

        AppEvent::Queue(queue_event) => match queue_event {
            QueueEvent::Entered {
                operation,
                position,
                snapshot,
            }
            | QueueEvent::Moved {
                operation,
                position,
                snapshot,
            } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    position = position,
                    queue_len = snapshot.len(),
                    "Admission queue changed"
                );
            }
            QueueEvent::Removed {
                operation,
                snapshot,
            } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    operation = %operation,
                    queue_len = snapshot.len(),
                    "Left admission queue"
                );
            }
            QueueEvent::LimitChanged { max_concurrent } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    max_concurrent = max_concurrent,
                    "Admission limit changed"
                );
            }
        },

        AppEvent::General(general_event) => match general_event {
            GeneralEvent::Warning { message, context } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    message = %message,
                    context = ?context,
                    "Warning"
                );
            }
            GeneralEvent::Error { message, details } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    message = %message,
                    details = ?details,
                    "Error"
                );
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    message = %message,
                    context = ?context,
                    "Debug log"
                );
            }
        },
    }
}
