//! Builder for the admission queue service

use crate::AdmissionQueue;
use opsched_config::SchedulerConfig;
use opsched_events::EventSender;
use std::time::Duration;

/// Builder for [`AdmissionQueue`]
#[derive(Debug, Default)]
pub struct AdmissionQueueBuilder {
    max_concurrent: Option<usize>,
    poll_interval: Option<Duration>,
    tx: Option<EventSender>,
}

impl AdmissionQueueBuilder {
    /// Create new queue builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the cap and poll interval from scheduler configuration
    #[must_use]
    pub fn with_config(mut self, config: &SchedulerConfig) -> Self {
        self.max_concurrent = Some(config.parallel_operations);
        self.poll_interval = Some(config.poll_interval());
        self
    }

    /// Set the concurrency cap (values below 1 are raised to 1)
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    /// Set the tick of the admission and completion polling loops
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    /// Set event sender for queue membership events
    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn build(self) -> AdmissionQueue {
        let defaults = SchedulerConfig::default();
        AdmissionQueue::from_parts(
            self.max_concurrent.unwrap_or(defaults.parallel_operations),
            self.poll_interval
                .unwrap_or_else(|| defaults.poll_interval()),
            self.tx,
        )
    }
}
