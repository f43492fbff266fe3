//! Integration tests for types

#[cfg(test)]
mod tests {
    use opsched_types::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OperationStatus::InQueue).unwrap();
        assert_eq!(json, r#""in_queue""#);

        let deserialized: OperationStatus = serde_json::from_str(r#""canceled""#).unwrap();
        assert_eq!(deserialized, OperationStatus::Canceled);
    }

    #[test]
    fn test_retry_mode_serializes_as_token() {
        let json = serde_json::to_string(&RetryMode::RetrySkipIntegrityCheck).unwrap();
        assert_eq!(json, r#""RetryNoHashCheck""#);

        let no_retry: RetryMode = serde_json::from_str(r#""""#).unwrap();
        assert_eq!(no_retry, RetryMode::NoRetry);
    }

    #[test]
    fn test_progress_lines_are_transient() {
        assert!(!LineKind::Progress.is_retained());
        assert!(LineKind::Info.is_retained());
        assert!(LineKind::StandardOutput.is_retained());
        assert!(LineKind::StandardError.is_retained());
    }

    #[test]
    fn test_badges_default_to_plain_run() {
        let badges = BadgeSet::default();
        assert!(!badges.as_administrator);
        assert!(!badges.interactive);
        assert!(!badges.skip_integrity_check);
        assert_eq!(badges.scope, None);
    }
}
