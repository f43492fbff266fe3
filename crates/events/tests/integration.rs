//! Integration tests for events

#[cfg(test)]
mod tests {
    use opsched_events::*;
    use opsched_types::{LineKind, OperationId};

    #[tokio::test]
    async fn test_event_sender_emit() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_debug("test debug");

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(
            event1.event,
            AppEvent::General(GeneralEvent::Error { .. })
        ));
        assert_eq!(event1.meta.level, EventLevel::Error);

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(
            event2.event,
            AppEvent::General(GeneralEvent::DebugLog { .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
    }

    #[test]
    fn test_levels_follow_line_kind() {
        let id = OperationId::new();
        let stderr = AppEvent::Operation(OperationEvent::LogLineAdded {
            operation: id,
            text: "boom".into(),
            kind: LineKind::StandardError,
        });
        let stdout = AppEvent::Operation(OperationEvent::LogLineAdded {
            operation: id,
            text: "ok".into(),
            kind: LineKind::StandardOutput,
        });
        assert_eq!(stderr.event_level(), EventLevel::Warn);
        assert_eq!(stdout.event_level(), EventLevel::Debug);
        assert_eq!(
            AppEvent::Operation(OperationEvent::Failed {
                operation: id,
                failure: None
            })
            .log_level(),
            tracing::Level::ERROR
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = AppEvent::Queue(QueueEvent::LimitChanged { max_concurrent: 2 });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "queue");
        assert_eq!(json["event"]["type"], "LimitChanged");
        assert_eq!(json["event"]["max_concurrent"], 2);
    }
}
