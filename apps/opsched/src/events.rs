//! Event handling and terminal feedback

use std::collections::HashMap;

use console::{Style, Term};
use opsched_events::{AppEvent, EventMessage, GeneralEvent, OperationEvent, QueueEvent};
use opsched_types::{LineKind, OperationId, OperationStatus};

use crate::logging::log_event_with_tracing;

/// Renders operation events on stderr while commands run
pub struct EventHandler {
    term: Term,
    colors_enabled: bool,
    debug_enabled: bool,
    quiet: bool,
    labels: HashMap<OperationId, String>,
}

impl EventHandler {
    /// Create new event handler; `quiet` suppresses all terminal output
    pub fn new(colors_enabled: bool, debug_enabled: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors_enabled,
            debug_enabled,
            quiet,
            labels: HashMap::new(),
        }
    }

    /// Name an operation in rendered output
    pub fn register(&mut self, operation: OperationId, label: impl Into<String>) {
        self.labels.insert(operation, label.into());
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: &EventMessage) {
        log_event_with_tracing(message);
        if self.quiet {
            return;
        }

        if let Some(line) = self.render(&message.event) {
            self.term.write_line(&line).unwrap_or(());
        }
    }

    fn render(&self, event: &AppEvent) -> Option<String> {
        match event {
            AppEvent::Operation(event) => self.render_operation(event),
            AppEvent::Queue(event) if self.debug_enabled => Some(self.render_queue(event)),
            AppEvent::Queue(_) => None,
            AppEvent::General(GeneralEvent::Warning { message, .. }) => {
                Some(self.paint(&Style::new().yellow(), &format!("warning: {message}")))
            }
            AppEvent::General(GeneralEvent::Error { message, .. }) => {
                Some(self.paint(&Style::new().red(), &format!("error: {message}")))
            }
            AppEvent::General(GeneralEvent::DebugLog { message, .. }) => self
                .debug_enabled
                .then(|| self.paint(&Style::new().dim(), message)),
        }
    }

    fn render_operation(&self, event: &OperationEvent) -> Option<String> {
        let label = self.label(event.operation());
        let text = match event {
            OperationEvent::LogLineAdded { text, kind, .. } => {
                let style = match kind {
                    LineKind::Info => Style::new().bold(),
                    LineKind::Progress => Style::new().dim(),
                    LineKind::StandardOutput => Style::new(),
                    LineKind::StandardError => Style::new().red(),
                };
                self.paint(&style, text)
            }
            OperationEvent::Succeeded { .. } => {
                self.paint(&Style::new().green().bold(), "succeeded")
            }
            OperationEvent::Failed { failure, .. } => {
                let detail = failure
                    .as_ref()
                    .and_then(|f| f.hint.as_deref())
                    .map(|hint| format!("failed ({hint})"))
                    .unwrap_or_else(|| "failed".to_string());
                self.paint(&Style::new().red().bold(), &detail)
            }
            OperationEvent::StatusChanged {
                status: OperationStatus::Canceled,
                ..
            } => self.paint(&Style::new().yellow(), "canceled"),
            OperationEvent::CancelRequested { .. } => {
                self.paint(&Style::new().yellow(), "cancel requested")
            }
            OperationEvent::BadgesChanged { badges, .. } if self.debug_enabled => {
                self.paint(&Style::new().cyan(), &format!("badges {badges:?}"))
            }
            OperationEvent::StatusChanged { status, .. } if self.debug_enabled => {
                self.paint(&Style::new().dim(), &format!("status {status}"))
            }
            _ => return None,
        };
        Some(format!("{} {text}", self.paint(&Style::new().cyan(), &format!("[{label}]"))))
    }

    fn render_queue(&self, event: &QueueEvent) -> String {
        let text = match event {
            QueueEvent::Entered {
                operation,
                position,
                ..
            } => format!("queue: {} entered at {position}", self.label(*operation)),
            QueueEvent::Removed { operation, snapshot } => format!(
                "queue: {} left, {} remaining",
                self.label(*operation),
                snapshot.len()
            ),
            QueueEvent::Moved {
                operation,
                position,
                ..
            } => format!("queue: {} moved to {position}", self.label(*operation)),
            QueueEvent::LimitChanged { max_concurrent } => {
                format!("queue: limit is now {max_concurrent}")
            }
        };
        self.paint(&Style::new().dim(), &text)
    }

    fn label(&self, operation: OperationId) -> String {
        self.labels
            .get(&operation)
            .cloned()
            .unwrap_or_else(|| operation.to_string())
    }

    fn paint(&self, style: &Style, text: &str) -> String {
        if self.colors_enabled {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsched_events::FailureContext;

    fn handler(debug: bool) -> (EventHandler, OperationId) {
        let mut handler = EventHandler::new(false, debug, false);
        let id = OperationId::new();
        handler.register(id, "build");
        (handler, id)
    }

    #[test]
    fn test_log_lines_are_labelled() {
        let (handler, id) = handler(false);
        let event = AppEvent::Operation(OperationEvent::LogLineAdded {
            operation: id,
            text: "compiling".into(),
            kind: LineKind::StandardOutput,
        });
        assert_eq!(handler.render(&event).as_deref(), Some("[build] compiling"));
    }

    #[test]
    fn test_failure_shows_hint() {
        let (handler, id) = handler(false);
        let event = AppEvent::Operation(OperationEvent::Failed {
            operation: id,
            failure: Some(FailureContext::new(
                None::<String>,
                "boom",
                Some("try again"),
                true,
            )),
        });
        assert_eq!(
            handler.render(&event).as_deref(),
            Some("[build] failed (try again)")
        );
    }

    #[test]
    fn test_queue_events_only_in_debug() {
        let (quiet, id) = handler(false);
        let event = AppEvent::Queue(QueueEvent::Entered {
            operation: id,
            position: 1,
            snapshot: vec![OperationId::new(), id],
        });
        assert!(quiet.render(&event).is_none());

        let (mut verbose, _) = handler(true);
        verbose.register(id, "build");
        assert_eq!(
            verbose.render(&event).as_deref(),
            Some("queue: build entered at 1")
        );
    }

    #[test]
    fn test_unknown_operation_uses_id() {
        let (handler, _) = handler(false);
        let other = OperationId::new();
        let event = AppEvent::Operation(OperationEvent::Succeeded { operation: other });
        assert_eq!(
            handler.render(&event),
            Some(format!("[{other}] succeeded"))
        );
    }
}
