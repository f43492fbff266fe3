//! User-driven changes to an operation's place in the queue

use std::sync::atomic::Ordering;

use opsched_queue::AdmissionQueue;
use opsched_types::{OperationId, OperationStatus};

use crate::Operation;

impl Operation {
    /// Let the current pass bypass admission once.
    ///
    /// Only meaningful while `InQueue`; otherwise a no-op.
    pub fn skip_queue(&self) {
        if self.status() != OperationStatus::InQueue {
            tracing::debug!(operation = %self.id(), status = %self.status(), "skip_queue ignored");
            return;
        }
        // Flag first: the admission loop must never see the entry gone without it
        self.inner.skip_queue_once.store(true, Ordering::Release);
        self.queue().remove(self.id());
        tracing::info!(operation = %self.id(), "skipping the queue");
    }

    /// Move right behind the admitted slots, ahead of every other waiter.
    pub fn run_next(&self) {
        self.reorder("run_next", AdmissionQueue::move_to_front_of_waiting);
    }

    /// Move to the end of the queue.
    pub fn send_to_back(&self) {
        self.reorder("send_to_back", AdmissionQueue::move_to_back);
    }

    fn reorder(
        &self,
        action: &'static str,
        reposition: impl FnOnce(&AdmissionQueue, OperationId) -> Option<usize>,
    ) {
        let id = self.id();
        if self.status() != OperationStatus::InQueue || !self.queue().contains(id) {
            tracing::debug!(operation = %id, action, "reorder ignored");
            return;
        }

        self.inner.force_hold.store(true, Ordering::Release);
        let position = reposition(self.queue(), id);
        self.inner.force_hold.store(false, Ordering::Release);

        tracing::info!(operation = %id, action, ?position, "operation repositioned");
    }
}
