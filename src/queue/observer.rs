//! Enqueue notification fan-out

use crate::error::{MatchmakingError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity of a queue subscriber
pub type SubscriberId = Uuid;

/// Receives a signal each time a request is enqueued. The signal carries no
/// payload; observers pull work from the queue themselves.
pub trait MatchQueueObserver: Send + Sync {
    fn subscriber_id(&self) -> SubscriberId;

    fn on_match_enqueued(&self);
}

/// Thread-safe set of observers keyed by subscriber id
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<HashMap<SubscriberId, Arc<dyn MatchQueueObserver>>>,
}

impl ObserverRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an observer. Subscribing an id that is already present keeps
    /// the existing observer.
    pub fn subscribe(
        self: &Arc<Self>,
        observer: Arc<dyn MatchQueueObserver>,
    ) -> Result<Subscription> {
        let subscriber_id = observer.subscriber_id();
        let mut observers = self
            .observers
            .lock()
            .map_err(|_| MatchmakingError::lock_poisoned("observer registry"))?;

        observers.entry(subscriber_id).or_insert(observer);
        debug!("Subscriber {} registered", subscriber_id);

        Ok(Subscription {
            registry: Arc::downgrade(self),
            subscriber_id,
        })
    }

    fn unsubscribe(&self, subscriber_id: SubscriberId) -> Result<bool> {
        let mut observers = self
            .observers
            .lock()
            .map_err(|_| MatchmakingError::lock_poisoned("observer registry"))?;

        Ok(observers.remove(&subscriber_id).is_some())
    }

    /// Signal every current observer. Observers are called outside the lock,
    /// so a callback may subscribe or unsubscribe without deadlocking.
    pub fn notify_all(&self) -> Result<usize> {
        let snapshot: Vec<Arc<dyn MatchQueueObserver>> = {
            let observers = self
                .observers
                .lock()
                .map_err(|_| MatchmakingError::lock_poisoned("observer registry"))?;
            observers.values().cloned().collect()
        };

        for observer in &snapshot {
            observer.on_match_enqueued();
        }

        Ok(snapshot.len())
    }

    pub fn len(&self) -> usize {
        self.observers.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by `subscribe`. Dropping it leaves the observer registered;
/// call [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    registry: Weak<ObserverRegistry>,
    subscriber_id: SubscriberId,
}

impl Subscription {
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    /// Remove the observer. Safe to call more than once and after the queue
    /// has been dropped.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        match registry.unsubscribe(self.subscriber_id) {
            Ok(true) => debug!("Subscriber {} removed", self.subscriber_id),
            Ok(false) => {}
            Err(e) => warn!("Failed to remove subscriber {}: {}", self.subscriber_id, e),
        }
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
