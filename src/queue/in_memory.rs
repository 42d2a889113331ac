//! Process-local match queue

use super::{MatchQueue, MatchQueueObserver, ObservedMatchQueue, ObserverRegistry, Subscription};
use crate::error::{MatchmakingError, Result};
use crate::types::MatchRequest;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Thread-safe in-memory FIFO with observer notification
#[derive(Debug)]
pub struct InMemoryMatchQueue {
    requests: Mutex<VecDeque<MatchRequest>>,
    observers: Arc<ObserverRegistry>,
}

impl Default for InMemoryMatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMatchQueue {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(VecDeque::new()),
            observers: ObserverRegistry::new(),
        }
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl MatchQueue for InMemoryMatchQueue {
    fn enqueue(&self, request: MatchRequest) -> Result<()> {
        {
            let mut requests = self
                .requests
                .lock()
                .map_err(|_| MatchmakingError::lock_poisoned("match queue"))?;
            debug!(
                "Enqueued match request for user {} ({} {})",
                request.requesting_user_id, request.game_type, request.match_type
            );
            requests.push_back(request);
        }

        // Request stays queued if notification fails
        if let Err(e) = self.observers.notify_all() {
            error!("Failed to notify queue observers: {}", e);
        }

        Ok(())
    }

    fn dequeue(&self) -> Result<Option<MatchRequest>> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|_| MatchmakingError::lock_poisoned("match queue"))?;
        Ok(requests.pop_front())
    }

    fn len(&self) -> usize {
        self.requests
            .lock()
            .map(|r| r.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

impl ObservedMatchQueue for InMemoryMatchQueue {
    fn subscribe(&self, observer: Arc<dyn MatchQueueObserver>) -> Result<Subscription> {
        self.observers.subscribe(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SubscriberId;
    use crate::types::{GameType, MatchType};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingObserver {
        id: SubscriberId,
        calls: AtomicUsize,
    }

    impl MatchQueueObserver for CountingObserver {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn on_match_enqueued(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn request() -> MatchRequest {
        MatchRequest::new(Uuid::new_v4(), GameType::Chess, MatchType::Any)
    }

    #[test]
    fn test_fifo_order() {
        let queue = InMemoryMatchQueue::new();
        let first = request();
        let second = request();

        queue.enqueue(first.clone()).unwrap();
        queue.enqueue(second.clone()).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue().unwrap(), Some(first));
        assert_eq!(queue.dequeue().unwrap(), Some(second));
        assert_eq!(queue.dequeue().unwrap(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_len_counts_requests_behind_poisoned_lock() {
        let queue = Arc::new(InMemoryMatchQueue::new());
        queue.enqueue(request()).unwrap();
        queue.enqueue(request()).unwrap();

        let inner = queue.clone();
        let _ = std::thread::spawn(move || {
            let _guard = inner.requests.lock().unwrap();
            panic!("poison the queue");
        })
        .join();

        assert!(queue.requests.is_poisoned());
        assert_eq!(queue.len(), 2);
        assert!(!queue.is_empty());
    }

    #[test]
    fn test_every_enqueue_notifies() {
        let queue = InMemoryMatchQueue::new();
        let observer = Arc::new(CountingObserver {
            id: Uuid::new_v4(),
            calls: AtomicUsize::new(0),
        });
        let subscription = queue.subscribe(observer.clone()).unwrap();

        for _ in 0..3 {
            queue.enqueue(request()).unwrap();
        }
        assert_eq!(observer.calls.load(Ordering::SeqCst), 3);

        subscription.unsubscribe();
        queue.enqueue(request()).unwrap();
        assert_eq!(observer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(queue.observer_count(), 0);
    }

    #[test]
    fn test_concurrent_enqueue_dequeue_loses_nothing() {
        let queue = Arc::new(InMemoryMatchQueue::new());
        let producers: Vec<_> = (0..8)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        queue.enqueue(request()).unwrap();
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }

        let mut drained = 0;
        while queue.dequeue().unwrap().is_some() {
            drained += 1;
        }
        assert_eq!(drained, 2000);
    }

    proptest! {
        #[test]
        fn prop_dequeue_preserves_enqueue_order(count in 0usize..64) {
            let queue = InMemoryMatchQueue::new();
            let requests: Vec<MatchRequest> = (0..count).map(|_| request()).collect();
            for r in &requests {
                queue.enqueue(r.clone()).unwrap();
            }

            let mut drained = Vec::new();
            while let Some(r) = queue.dequeue().unwrap() {
                drained.push(r);
            }
            prop_assert_eq!(drained, requests);
        }
    }
}
