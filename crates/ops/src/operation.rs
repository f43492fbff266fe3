//! Operation handle and its observable state

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use opsched_errors::{ContractError, Error};
use opsched_events::{ObserverSet, OperationEvent, OperationObserver, SubscriptionId};
use opsched_queue::AdmissionQueue;
use opsched_types::{
    BadgeSet, LineKind, LogLine, OperationId, OperationMetadata, OperationStatus,
};
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;

use crate::OperationBody;

/// Progress line shown from construction until the first lifecycle pass
pub(crate) const PLEASE_WAIT: &str = "Please wait...";

#[derive(Debug)]
struct OperationState {
    status: OperationStatus,
    log: Vec<LogLine>,
    badges: Option<BadgeSet>,
    /// Body task of the pass with the given generation, while it runs
    body_task: Option<(u64, AbortHandle)>,
}

pub(crate) struct OperationInner {
    id: OperationId,
    queue: AdmissionQueue,
    body: Arc<dyn OperationBody>,
    queue_enabled: bool,
    metadata: RwLock<OperationMetadata>,
    state: Mutex<OperationState>,
    observers: ObserverSet,
    /// Set by the first `run()`; distinguishes "fresh" from "queued" InQueue
    started: AtomicBool,
    /// Keeps the admission loop waiting while a reorder is in flight
    pub(crate) force_hold: AtomicBool,
    /// Lets the current pass bypass admission once
    pub(crate) skip_queue_once: AtomicBool,
    /// Incremented by every pass under the state lock; older passes withdraw
    /// when it moves on
    generation: AtomicU64,
    /// Single permit held by the body task, so bodies of one operation never overlap
    body_slot: Arc<Semaphore>,
}

impl Drop for OperationInner {
    fn drop(&mut self) {
        if self.queue.remove(self.id) {
            tracing::debug!(operation = %self.id, "dropped operation left the queue");
        }
    }
}

/// Cloneable handle to one schedulable operation.
///
/// All clones share the same state. When the last clone is dropped the
/// operation is removed from the admission queue.
#[derive(Clone)]
pub struct Operation {
    pub(crate) inner: Arc<OperationInner>,
}

/// Builder for [`Operation`]
pub struct OperationBuilder {
    queue: AdmissionQueue,
    body: Arc<dyn OperationBody>,
    metadata: OperationMetadata,
    queue_enabled: bool,
    observers: Vec<Arc<dyn OperationObserver>>,
}

impl OperationBuilder {
    /// Set the human-readable strings
    #[must_use]
    pub fn with_metadata(mut self, metadata: OperationMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Run without admission control when `false`
    #[must_use]
    pub fn with_queue_enabled(mut self, queue_enabled: bool) -> Self {
        self.queue_enabled = queue_enabled;
        self
    }

    /// Register an observer before construction, so it sees the initial events
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn OperationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    #[must_use]
    pub fn build(self) -> Operation {
        let observers = ObserverSet::new();
        for observer in self.observers {
            observers.subscribe(observer);
        }

        let operation = Operation {
            inner: Arc::new(OperationInner {
                id: OperationId::new(),
                queue: self.queue,
                body: self.body,
                queue_enabled: self.queue_enabled,
                metadata: RwLock::new(self.metadata),
                state: Mutex::new(OperationState {
                    status: OperationStatus::InQueue,
                    log: Vec::new(),
                    badges: None,
                    body_task: None,
                }),
                observers,
                started: AtomicBool::new(false),
                force_hold: AtomicBool::new(false),
                skip_queue_once: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                body_slot: Arc::new(Semaphore::new(1)),
            }),
        };

        tracing::debug!(operation = %operation.id(), queue_enabled = operation.queue_enabled(), "operation created");
        operation.set_status(OperationStatus::InQueue);
        operation.line(PLEASE_WAIT, LineKind::Progress);
        operation
    }
}

impl std::fmt::Debug for OperationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationBuilder")
            .field("metadata", &self.metadata)
            .field("queue_enabled", &self.queue_enabled)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Operation {
    /// Start building an operation that will be admitted through `queue`
    pub fn builder(queue: AdmissionQueue, body: Arc<dyn OperationBody>) -> OperationBuilder {
        OperationBuilder {
            queue,
            body,
            metadata: OperationMetadata::default(),
            queue_enabled: true,
            observers: Vec::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, OperationState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn id(&self) -> OperationId {
        self.inner.id
    }

    #[must_use]
    pub fn status(&self) -> OperationStatus {
        self.state().status
    }

    #[must_use]
    pub fn queue_enabled(&self) -> bool {
        self.inner.queue_enabled
    }

    /// Whether `run()` has been called at least once
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn queue(&self) -> &AdmissionQueue {
        &self.inner.queue
    }

    pub(crate) fn body(&self) -> Arc<dyn OperationBody> {
        Arc::clone(&self.inner.body)
    }

    #[must_use]
    pub fn metadata(&self) -> OperationMetadata {
        self.inner
            .metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the metadata. Takes effect on the next `run()`.
    pub fn set_metadata(&self, metadata: OperationMetadata) {
        *self
            .inner
            .metadata
            .write()
            .unwrap_or_else(PoisonError::into_inner) = metadata;
    }

    /// Register an observer; it is called synchronously after earlier ones.
    pub fn subscribe(&self, observer: Arc<dyn OperationObserver>) -> SubscriptionId {
        self.inner.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    pub(crate) fn notify(&self, event: &OperationEvent) {
        self.inner.observers.notify(event);
    }

    /// Assign a status and raise `StatusChanged`, even if the value is unchanged.
    pub(crate) fn set_status(&self, status: OperationStatus) {
        self.state().status = status;
        self.notify(&OperationEvent::StatusChanged {
            operation: self.id(),
            status,
        });
    }

    /// Start a new pass: reject it while another one is queued or running,
    /// otherwise take the next generation and reset the status to `InQueue`.
    pub(crate) fn begin_pass(&self) -> Result<u64, Error> {
        let generation = {
            let mut state = self.state();
            if self.inner.started.swap(true, Ordering::AcqRel) && state.status.is_active() {
                return Err(ContractError::AlreadyActive {
                    operation: self.id().to_string(),
                }
                .into());
            }
            state.status = OperationStatus::InQueue;
            self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1
        };
        self.notify(&OperationEvent::StatusChanged {
            operation: self.id(),
            status: OperationStatus::InQueue,
        });
        Ok(generation)
    }

    /// Assign `to` only if `generation` is the current pass and the status is `from`.
    pub(crate) fn transition(
        &self,
        generation: u64,
        from: OperationStatus,
        to: OperationStatus,
    ) -> bool {
        {
            let mut state = self.state();
            if self.current_generation() != generation || state.status != from {
                return false;
            }
            state.status = to;
        }
        self.notify(&OperationEvent::StatusChanged {
            operation: self.id(),
            status: to,
        });
        true
    }

    /// Leave the queue and store the terminal status chosen by `decide` from
    /// the current one, in one step with the generation check.
    ///
    /// Returns `None` without touching anything when a newer pass owns the
    /// operation. Observers are not notified here.
    pub(crate) fn settle(
        &self,
        generation: u64,
        decide: impl FnOnce(OperationStatus) -> OperationStatus,
    ) -> Option<OperationStatus> {
        let mut state = self.state();
        if self.current_generation() != generation {
            return None;
        }
        self.inner.queue.remove(self.id());
        state.status = decide(state.status);
        Some(state.status)
    }

    pub(crate) fn body_slot(&self) -> Arc<Semaphore> {
        Arc::clone(&self.inner.body_slot)
    }

    /// Remember the running body task so `cancel()` can abort it.
    pub(crate) fn track_body(&self, generation: u64, task: AbortHandle) {
        self.state().body_task = Some((generation, task));
    }

    pub(crate) fn untrack_body(&self, generation: u64) {
        let mut state = self.state();
        if state
            .body_task
            .as_ref()
            .is_some_and(|(owner, _)| *owner == generation)
        {
            state.body_task = None;
        }
    }

    /// Record a line of output and raise `LogLineAdded`.
    ///
    /// Progress lines reach observers but are not kept in [`Operation::output`].
    pub fn line(&self, text: impl Into<String>, kind: LineKind) {
        let text = text.into();
        if kind.is_retained() {
            self.state().log.push(LogLine::new(text.clone(), kind));
        }
        self.notify(&OperationEvent::LogLineAdded {
            operation: self.id(),
            text,
            kind,
        });
    }

    /// Every retained line, in insertion order
    #[must_use]
    pub fn output(&self) -> Vec<LogLine> {
        self.state().log.clone()
    }

    #[must_use]
    pub fn badges(&self) -> Option<BadgeSet> {
        self.state().badges
    }

    /// Publish how the operation is being run
    pub fn apply_capabilities(&self, badges: BadgeSet) {
        self.state().badges = Some(badges);
        self.notify(&OperationEvent::BadgesChanged {
            operation: self.id(),
            badges,
        });
    }

    /// Icon for presentation layers, resolved by the body.
    ///
    /// # Errors
    ///
    /// Returns whatever error the body's resolver produced.
    pub async fn icon(&self) -> Result<String, Error> {
        self.inner.body.icon().await
    }

    /// Request cancellation.
    ///
    /// A running operation is marked `Canceled` and its body task is
    /// aborted. A queued one is
    /// withdrawn before its body ever starts. Terminal operations are left
    /// untouched.
    pub fn cancel(&self) {
        let previous = {
            let mut state = self.state();
            let previous = state.status;
            if previous.is_active() {
                state.status = OperationStatus::Canceled;
            }
            if let Some((_, task)) = state.body_task.take() {
                task.abort();
            }
            previous
        };

        match previous {
            OperationStatus::Running => {
                tracing::info!(operation = %self.id(), "cancel requested while running");
                self.notify(&OperationEvent::StatusChanged {
                    operation: self.id(),
                    status: OperationStatus::Canceled,
                });
                self.inner.queue.remove(self.id());
                self.notify(&OperationEvent::CancelRequested {
                    operation: self.id(),
                });
            }
            OperationStatus::InQueue => {
                tracing::info!(operation = %self.id(), "cancel requested while queued");
                self.notify(&OperationEvent::StatusChanged {
                    operation: self.id(),
                    status: OperationStatus::Canceled,
                });
                self.inner.queue.remove(self.id());
            }
            status => {
                tracing::debug!(operation = %self.id(), %status, "cancel ignored");
            }
        }
    }

    pub(crate) fn current_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id())
            .field("status", &self.status())
            .field("queue_enabled", &self.queue_enabled())
            .field("observers", &self.inner.observers)
            .finish_non_exhaustive()
    }
}
