//! Synchronous multi-subscriber observers for operation events

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::{AppEvent, EventEmitter, EventSender, OperationEvent};

/// Receives operation events synchronously on the task that raised them.
///
/// Implementations must tolerate duplicate `StatusChanged` notifications for
/// the same value and must not block.
pub trait OperationObserver: Send + Sync {
    fn on_event(&self, event: &OperationEvent);
}

impl<F> OperationObserver for F
where
    F: Fn(&OperationEvent) + Send + Sync,
{
    fn on_event(&self, event: &OperationEvent) {
        self(event);
    }
}

/// Handle returned by [`ObserverSet::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of observers for one operation
#[derive(Default)]
pub struct ObserverSet {
    next_id: AtomicU64,
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn OperationObserver>)>>,
}

impl ObserverSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; it will be called after all earlier ones.
    pub fn subscribe(&self, observer: Arc<dyn OperationObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    /// Remove a previously registered observer. Returns whether it was present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every observer in registration order.
    ///
    /// The list is snapshotted first, so observers may subscribe, unsubscribe
    /// or query the operation from inside the callback.
    pub fn notify(&self, event: &OperationEvent) {
        let snapshot: Vec<Arc<dyn OperationObserver>> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in snapshot {
            observer.on_event(event);
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.len())
            .finish()
    }
}

/// Forwards operation events onto an event channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: EventSender,
}

impl ChannelObserver {
    #[must_use]
    pub fn new(tx: EventSender) -> Self {
        Self { tx }
    }
}

impl EventEmitter for ChannelObserver {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.tx)
    }
}

impl OperationObserver for ChannelObserver {
    fn on_event(&self, event: &OperationEvent) {
        self.emit(AppEvent::Operation(event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsched_types::{OperationId, OperationStatus};
    use std::sync::Mutex;

    fn status_event(id: OperationId) -> OperationEvent {
        OperationEvent::StatusChanged {
            operation: id,
            status: OperationStatus::Running,
        }
    }

    #[test]
    fn test_observers_run_in_registration_order() {
        let set = ObserverSet::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let calls = Arc::clone(&calls);
            set.subscribe(Arc::new(move |_: &OperationEvent| {
                calls.lock().unwrap().push(name);
            }));
        }

        set.notify(&status_event(OperationId::new()));
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe() {
        let set = ObserverSet::new();
        let id = set.subscribe(Arc::new(|_: &OperationEvent| {}));
        assert_eq!(set.len(), 1);
        assert!(set.unsubscribe(id));
        assert!(!set.unsubscribe(id));
        assert!(set.is_empty());
    }

    #[test]
    fn test_observer_may_subscribe_during_notify() {
        let set = Arc::new(ObserverSet::new());
        let inner = Arc::clone(&set);
        set.subscribe(Arc::new(move |_: &OperationEvent| {
            inner.subscribe(Arc::new(|_: &OperationEvent| {}));
        }));

        set.notify(&status_event(OperationId::new()));
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn test_channel_observer_forwards_with_correlation() {
        let (tx, mut rx) = crate::channel();
        let observer = ChannelObserver::new(tx);
        let id = OperationId::new();

        observer.on_event(&OperationEvent::Starting { operation: id });

        let message = rx.recv().await.unwrap();
        assert_eq!(message.meta.correlation_id, Some(id.to_string()));
        assert!(matches!(
            message.event,
            AppEvent::Operation(OperationEvent::Starting { .. })
        ));
    }
}
