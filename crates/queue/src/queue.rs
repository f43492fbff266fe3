//! The shared admission queue

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use opsched_errors::{ContractError, Error};
use opsched_events::{AppEvent, EventEmitter, EventSender, QueueEvent};
use opsched_types::OperationId;

use crate::AdmissionQueueBuilder;

/// Where an operation stands with respect to admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Within the first `max_concurrent` entries
    Admitted { index: usize },
    /// Behind the admitted slots; `position` is 1 for the first waiter
    Waiting { index: usize, position: usize },
    /// Not in the queue
    Absent,
}

struct QueueInner {
    entries: Mutex<Vec<OperationId>>,
    max_concurrent: AtomicUsize,
    poll_interval: Duration,
    tx: Option<EventSender>,
}

/// Cloneable handle to the process-wide admission queue
#[derive(Clone)]
pub struct AdmissionQueue {
    inner: Arc<QueueInner>,
}

impl AdmissionQueue {
    /// Queue with the given cap and the default poll interval
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        AdmissionQueueBuilder::new()
            .with_max_concurrent(max_concurrent)
            .build()
    }

    #[must_use]
    pub fn builder() -> AdmissionQueueBuilder {
        AdmissionQueueBuilder::new()
    }

    pub(crate) fn from_parts(
        max_concurrent: usize,
        poll_interval: Duration,
        tx: Option<EventSender>,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                entries: Mutex::new(Vec::new()),
                max_concurrent: AtomicUsize::new(max_concurrent.max(1)),
                poll_interval,
                tx,
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<OperationId>> {
        // A panic while holding the lock cannot leave the Vec half-mutated
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Concurrency cap
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent.load(Ordering::Acquire)
    }

    /// Change the concurrency cap; waiting operations pick it up on their next tick.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        let max_concurrent = max_concurrent.max(1);
        let _entries = self.entries();
        let previous = self
            .inner
            .max_concurrent
            .swap(max_concurrent, Ordering::AcqRel);
        if previous != max_concurrent {
            tracing::info!(previous, max_concurrent, "admission limit changed");
            self.emit(AppEvent::Queue(QueueEvent::LimitChanged { max_concurrent }));
        }
    }

    /// Tick used by cooperative polling loops
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// Append an operation at the end of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::AlreadyQueued`] if the operation is already present.
    pub fn enter(&self, id: OperationId) -> Result<usize, Error> {
        let mut entries = self.entries();
        if entries.contains(&id) {
            return Err(ContractError::AlreadyQueued {
                operation: id.to_string(),
            }
            .into());
        }
        entries.push(id);
        let position = entries.len() - 1;

        tracing::debug!(operation = %id, position, "entered admission queue");
        // Sent under the lock so snapshots reach the channel in mutation order
        self.emit(AppEvent::Queue(QueueEvent::Entered {
            operation: id,
            position,
            snapshot: entries.clone(),
        }));
        Ok(position)
    }

    /// Zero-based index of the operation, if present
    #[must_use]
    pub fn position(&self, id: OperationId) -> Option<usize> {
        self.entries().iter().position(|entry| *entry == id)
    }

    #[must_use]
    pub fn contains(&self, id: OperationId) -> bool {
        self.position(id).is_some()
    }

    /// Admission state, read under one lock together with the cap
    #[must_use]
    pub fn admission(&self, id: OperationId) -> Admission {
        let entries = self.entries();
        let max_concurrent = self.max_concurrent();
        match entries.iter().position(|entry| *entry == id) {
            None => Admission::Absent,
            Some(index) if index < max_concurrent => Admission::Admitted { index },
            Some(index) => Admission::Waiting {
                index,
                position: index - max_concurrent + 1,
            },
        }
    }

    /// Remove the operation. Safe to call when it is absent.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, id: OperationId) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|entry| *entry != id);
        if entries.len() == before {
            return false;
        }

        tracing::debug!(operation = %id, "left admission queue");
        self.emit(AppEvent::Queue(QueueEvent::Removed {
            operation: id,
            snapshot: entries.clone(),
        }));
        true
    }

    /// Move the operation right behind the admitted slots, at index
    /// `min(max_concurrent, len)` after its removal.
    ///
    /// Returns the new index, or `None` if the operation is not queued.
    pub fn move_to_front_of_waiting(&self, id: OperationId) -> Option<usize> {
        self.reposition(id, |len, max_concurrent| max_concurrent.min(len))
    }

    /// Move the operation to the end of the queue.
    ///
    /// Returns the new index, or `None` if the operation is not queued.
    pub fn move_to_back(&self, id: OperationId) -> Option<usize> {
        self.reposition(id, |len, _| len)
    }

    fn reposition(&self, id: OperationId, target: impl FnOnce(usize, usize) -> usize) -> Option<usize> {
        let mut entries = self.entries();
        let current = entries.iter().position(|entry| *entry == id)?;
        entries.remove(current);
        let position = target(entries.len(), self.max_concurrent());
        entries.insert(position, id);

        tracing::debug!(operation = %id, position, "repositioned in admission queue");
        self.emit(AppEvent::Queue(QueueEvent::Moved {
            operation: id,
            position,
            snapshot: entries.clone(),
        }));
        Some(position)
    }

    /// Read-only copy of the current order
    #[must_use]
    pub fn snapshot(&self) -> Vec<OperationId> {
        self.entries().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl EventEmitter for AdmissionQueue {
    fn event_sender(&self) -> Option<&EventSender> {
        self.inner.tx.as_ref()
    }
}

impl std::fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("entries", &self.snapshot())
            .field("max_concurrent", &self.max_concurrent())
            .field("poll_interval", &self.inner.poll_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<OperationId> {
        (0..n).map(|_| OperationId::new()).collect()
    }

    #[test]
    fn test_enter_appends_in_order() {
        let queue = AdmissionQueue::new(1);
        let ops = ids(3);
        for (expected, id) in ops.iter().enumerate() {
            assert_eq!(queue.enter(*id).unwrap(), expected);
        }
        assert_eq!(queue.snapshot(), ops);
    }

    #[test]
    fn test_double_enter_is_contract_violation() {
        let queue = AdmissionQueue::new(1);
        let id = OperationId::new();
        queue.enter(id).unwrap();
        let err = queue.enter(id).unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let queue = AdmissionQueue::new(1);
        let id = OperationId::new();
        queue.enter(id).unwrap();
        assert!(queue.remove(id));
        assert!(!queue.remove(id));
        assert_eq!(queue.position(id), None);
    }

    #[test]
    fn test_admission_positions() {
        let queue = AdmissionQueue::new(2);
        let ops = ids(4);
        for id in &ops {
            queue.enter(*id).unwrap();
        }

        assert_eq!(queue.admission(ops[0]), Admission::Admitted { index: 0 });
        assert_eq!(queue.admission(ops[1]), Admission::Admitted { index: 1 });
        assert_eq!(
            queue.admission(ops[2]),
            Admission::Waiting {
                index: 2,
                position: 1
            }
        );
        assert_eq!(
            queue.admission(ops[3]),
            Admission::Waiting {
                index: 3,
                position: 2
            }
        );
        assert_eq!(queue.admission(OperationId::new()), Admission::Absent);
    }

    #[test]
    fn test_raising_the_limit_admits_waiters() {
        let queue = AdmissionQueue::new(1);
        let ops = ids(2);
        for id in &ops {
            queue.enter(*id).unwrap();
        }
        assert!(matches!(queue.admission(ops[1]), Admission::Waiting { .. }));

        queue.set_max_concurrent(2);
        assert_eq!(queue.admission(ops[1]), Admission::Admitted { index: 1 });
    }

    #[test]
    fn test_limit_never_below_one() {
        let queue = AdmissionQueue::new(0);
        assert_eq!(queue.max_concurrent(), 1);
        queue.set_max_concurrent(0);
        assert_eq!(queue.max_concurrent(), 1);
    }

    #[test]
    fn test_move_to_front_of_waiting() {
        let queue = AdmissionQueue::new(1);
        let ops = ids(4);
        for id in &ops {
            queue.enter(*id).unwrap();
        }

        assert_eq!(queue.move_to_front_of_waiting(ops[3]), Some(1));
        assert_eq!(queue.snapshot(), vec![ops[0], ops[3], ops[1], ops[2]]);
    }

    #[test]
    fn test_move_to_front_with_short_queue() {
        let queue = AdmissionQueue::new(4);
        let ops = ids(2);
        for id in &ops {
            queue.enter(*id).unwrap();
        }

        // min(cap, len) with the operation removed: min(4, 1) = 1
        assert_eq!(queue.move_to_front_of_waiting(ops[0]), Some(1));
        assert_eq!(queue.snapshot(), vec![ops[1], ops[0]]);
    }

    #[test]
    fn test_move_to_back() {
        let queue = AdmissionQueue::new(1);
        let ops = ids(3);
        for id in &ops {
            queue.enter(*id).unwrap();
        }

        assert_eq!(queue.move_to_back(ops[0]), Some(2));
        assert_eq!(queue.snapshot(), vec![ops[1], ops[2], ops[0]]);
    }

    #[test]
    fn test_reposition_absent_is_noop() {
        let queue = AdmissionQueue::new(1);
        let id = OperationId::new();
        queue.enter(id).unwrap();

        assert_eq!(queue.move_to_back(OperationId::new()), None);
        assert_eq!(queue.move_to_front_of_waiting(OperationId::new()), None);
        assert_eq!(queue.snapshot(), vec![id]);
    }
}
