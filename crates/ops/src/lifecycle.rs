//! One lifecycle pass: admission, body attempts and terminal mapping

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use opsched_errors::{ContractError, Error, OperationError};
use opsched_events::{FailureContext, OperationEvent};
use opsched_queue::Admission;
use opsched_types::{LineKind, OperationMetadata, OperationStatus, Verdict};
use tokio::sync::OwnedSemaphorePermit;

use crate::Operation;

pub(crate) const STARTING: &str = "Starting operation...";
pub(crate) const CANCELED_BY_USER: &str = "Operation canceled by user";
pub(crate) const INTERNAL_ERROR: &str = "An internal error occurred:";
pub(crate) const SECONDARY_INTERNAL_ERROR: &str =
    "An internal error occurred while handling an internal error:";

enum AdmissionOutcome {
    Admitted,
    Withdrawn,
}

struct Attempt {
    verdict: Verdict,
    failure: Option<FailureContext>,
}

impl Attempt {
    fn canceled() -> Self {
        Self {
            verdict: Verdict::Canceled,
            failure: None,
        }
    }

    fn failed(failure: FailureContext) -> Self {
        Self {
            verdict: Verdict::Failure,
            failure: Some(failure),
        }
    }
}

impl Operation {
    /// Run one lifecycle pass to completion.
    ///
    /// The operation enters the admission queue (unless queueing is
    /// disabled), waits until admitted, runs its body until a verdict other
    /// than `AutoRetry` comes back, then settles on a terminal status.
    /// Returns `Ok` when the pass was withdrawn from the queue or when an
    /// internal failure was absorbed and reported as `Failed`.
    ///
    /// # Errors
    ///
    /// - [`ContractError::MissingMetadata`] if a metadata string is empty;
    ///   nothing about the operation changes in that case.
    /// - [`ContractError::AlreadyActive`] if a previous pass is still queued
    ///   or running.
    /// - [`ContractError::AlreadyQueued`] if the id is already in the queue;
    ///   the operation is marked `Failed` first.
    pub async fn run(&self) -> Result<(), Error> {
        self.metadata().validate()?;
        let generation = self.begin_pass()?;

        let mut finished = false;
        let outcome = AssertUnwindSafe(self.pass(generation, &mut finished))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                tracing::error!(operation = %self.id(), error = %err, "lifecycle pass failed");
                self.report_internal_failure(generation, &err.to_string(), finished);
                Err(err)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(operation = %self.id(), error = %message, "lifecycle pass panicked");
                self.report_internal_failure(generation, &message, finished);
                Ok(())
            }
        }
    }

    async fn pass(&self, generation: u64, finished: &mut bool) -> Result<(), Error> {
        let id = self.id();
        if self.queue().contains(id) {
            return Err(ContractError::AlreadyQueued {
                operation: id.to_string(),
            }
            .into());
        }

        let metadata = self.metadata();
        self.line(&metadata.operation_information, LineKind::Info);
        self.line(&metadata.status, LineKind::Progress);

        if self.queue_enabled() {
            self.inner.skip_queue_once.store(false, Ordering::Release);
            self.queue().enter(id)?;
            self.notify(&OperationEvent::Enqueued { operation: id });

            if let AdmissionOutcome::Withdrawn = self.wait_for_admission(generation).await {
                tracing::info!(operation = %id, "withdrawn from the queue before admission");
                self.finish(finished);
                return Ok(());
            }
        }

        if self.transition(generation, OperationStatus::InQueue, OperationStatus::Running) {
            tracing::info!(operation = %id, title = %metadata.title, "operation admitted");
            self.line(STARTING, LineKind::Progress);
            self.notify(&OperationEvent::Starting { operation: id });
        }

        let attempt = loop {
            let attempt = self.attempt(generation).await;
            if attempt.verdict != Verdict::AutoRetry {
                break attempt;
            }
            tracing::debug!(operation = %id, "body asked for an automatic retry");
        };

        self.finish(finished);
        let target = match attempt.verdict {
            Verdict::Success => OperationStatus::Succeeded,
            Verdict::Canceled => OperationStatus::Canceled,
            Verdict::Failure | Verdict::AutoRetry => OperationStatus::Failed,
        };
        // A cancellation that lands after the body returned still wins
        let settled = self.settle(generation, |current| {
            if current == OperationStatus::Canceled {
                current
            } else {
                target
            }
        });
        let Some(status) = settled else {
            tracing::debug!(operation = %id, generation, "superseded pass leaves state alone");
            return Ok(());
        };
        self.notify(&OperationEvent::StatusChanged {
            operation: id,
            status,
        });

        match status {
            OperationStatus::Succeeded => {
                tracing::info!(operation = %id, "operation succeeded");
                self.notify(&OperationEvent::Succeeded { operation: id });
                self.line(&metadata.success_message, LineKind::StandardOutput);
            }
            OperationStatus::Canceled => {
                tracing::info!(operation = %id, "operation canceled");
                self.line(CANCELED_BY_USER, LineKind::StandardError);
            }
            OperationStatus::Failed | OperationStatus::InQueue | OperationStatus::Running => {
                tracing::warn!(operation = %id, "operation failed");
                self.notify(&OperationEvent::Failed {
                    operation: id,
                    failure: attempt.failure,
                });
                self.report_failure_message(&metadata);
            }
        }
        Ok(())
    }

    async fn wait_for_admission(&self, generation: u64) -> AdmissionOutcome {
        let id = self.id();
        let poll = self.queue().poll_interval();
        let mut reported = None;

        loop {
            if !self.is_current(generation) {
                return AdmissionOutcome::Withdrawn;
            }

            if !self.inner.force_hold.load(Ordering::Acquire) {
                if self.inner.skip_queue_once.load(Ordering::Acquire) {
                    return AdmissionOutcome::Admitted;
                }
                match self.queue().admission(id) {
                    Admission::Admitted { .. } => return AdmissionOutcome::Admitted,
                    Admission::Absent => return AdmissionOutcome::Withdrawn,
                    Admission::Waiting { position, .. } => {
                        if reported != Some(position) {
                            reported = Some(position);
                            self.line(
                                format!("Operation on queue (position {position})..."),
                                LineKind::Progress,
                            );
                        }
                    }
                }
            }

            tokio::time::sleep(poll).await;
        }
    }

    /// Run the body once, watching for cancellation every poll interval.
    async fn attempt(&self, generation: u64) -> Attempt {
        let Some(slot) = self.acquire_body_slot(generation).await else {
            return Attempt::canceled();
        };

        let body = self.body();
        let operation = self.clone();
        let mut handle = tokio::spawn(async move {
            // Released when the body finishes or its task is aborted
            let _slot = slot;
            body.perform(&operation).await
        });
        self.track_body(generation, handle.abort_handle());
        let poll = self.queue().poll_interval();

        let joined = loop {
            if self.is_cancelled(generation) {
                handle.abort();
                self.untrack_body(generation);
                tracing::debug!(operation = %self.id(), "body aborted after cancellation");
                return Attempt::canceled();
            }
            if let Ok(joined) = tokio::time::timeout(poll, &mut handle).await {
                break joined;
            }
        };
        self.untrack_body(generation);

        if self.is_cancelled(generation) {
            return Attempt::canceled();
        }

        match joined {
            Ok(Ok(verdict)) => Attempt {
                verdict,
                failure: None,
            },
            Ok(Err(err)) => {
                tracing::warn!(operation = %self.id(), error = %err, "body returned an error");
                self.lines(&err.to_string(), LineKind::StandardError);
                Attempt::failed(FailureContext::from_error(&err))
            }
            Err(join_error) if join_error.is_cancelled() => Attempt::canceled(),
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic().as_ref())
                } else {
                    join_error.to_string()
                };
                tracing::warn!(operation = %self.id(), error = %message, "body panicked");
                self.lines(&message, LineKind::StandardError);
                Attempt::failed(FailureContext::from_error(&OperationError::BodyPanicked {
                    message,
                }))
            }
        }
    }

    /// Wait until no earlier body of this operation is still alive.
    ///
    /// Returns `None` if the pass is canceled or superseded meanwhile.
    async fn acquire_body_slot(&self, generation: u64) -> Option<OwnedSemaphorePermit> {
        let poll = self.queue().poll_interval();
        loop {
            if self.is_cancelled(generation) {
                return None;
            }
            match tokio::time::timeout(poll, self.body_slot().acquire_owned()).await {
                Ok(permit) => return permit.ok(),
                Err(_) => {
                    tracing::debug!(operation = %self.id(), "previous body still shutting down");
                }
            }
        }
    }

    /// Mark the pass `Failed` after an error escaped it.
    ///
    /// Observer panics raised while reporting are caught and logged here. A
    /// superseded pass only logs: status and queue entry belong to the newer
    /// pass.
    fn report_internal_failure(&self, generation: u64, detail: &str, finished: bool) {
        let id = self.id();
        if self.settle(generation, |_| OperationStatus::Failed).is_none() {
            tracing::warn!(operation = %id, generation, error = %detail, "superseded pass failed");
            if !finished {
                let _ = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    self.notify(&OperationEvent::Finished { operation: id });
                }));
            }
            return;
        }

        let failure = FailureContext::from_error(&OperationError::InternalFailure {
            operation: id.to_string(),
            message: detail.to_string(),
        });

        let reported = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.line(INTERNAL_ERROR, LineKind::StandardError);
            self.lines(detail, LineKind::StandardError);
            self.notify(&OperationEvent::StatusChanged {
                operation: id,
                status: OperationStatus::Failed,
            });
            if !finished {
                self.notify(&OperationEvent::Finished { operation: id });
            }
            self.notify(&OperationEvent::Failed {
                operation: id,
                failure: Some(failure),
            });
        }));

        if let Err(payload) = reported {
            let message = panic_message(payload.as_ref());
            tracing::error!(operation = %id, error = %message, "failure while reporting an internal error");
            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| {
                self.line(SECONDARY_INTERNAL_ERROR, LineKind::StandardError);
                self.lines(&message, LineKind::StandardError);
            }));
        }

        let metadata = self.metadata();
        let _ = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.report_failure_message(&metadata);
        }));
    }

    fn report_failure_message(&self, metadata: &OperationMetadata) {
        self.line(&metadata.failure_message, LineKind::StandardError);
        self.line(
            format!("{} - see the log for details", metadata.failure_message),
            LineKind::Progress,
        );
    }

    fn finish(&self, finished: &mut bool) {
        if !*finished {
            *finished = true;
            self.notify(&OperationEvent::Finished {
                operation: self.id(),
            });
        }
    }

    fn lines(&self, text: &str, kind: LineKind) {
        for line in text.lines() {
            self.line(line, kind);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }

    fn is_cancelled(&self, generation: u64) -> bool {
        self.status() == OperationStatus::Canceled || !self.is_current(generation)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_downcasts() {
        let from_str: Box<dyn Any + Send> = Box::new("boom");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(from_str.as_ref()), "boom");
        assert_eq!(panic_message(from_string.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "panic with a non-string payload");
    }
}
