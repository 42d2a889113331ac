//! Match request queueing
//!
//! The queue is a FIFO of [`MatchRequest`]s that signals its observers on every
//! enqueue. Observers never receive the request itself; they dequeue.

pub mod in_memory;
pub mod observer;

pub use in_memory::InMemoryMatchQueue;
pub use observer::{MatchQueueObserver, ObserverRegistry, SubscriberId, Subscription};

use crate::error::Result;
use crate::types::MatchRequest;
use std::sync::Arc;

/// FIFO of pending match requests
pub trait MatchQueue: Send + Sync {
    /// Append a request and signal observers
    fn enqueue(&self, request: MatchRequest) -> Result<()>;

    /// Remove the oldest request, or `None` when the queue is empty
    fn dequeue(&self) -> Result<Option<MatchRequest>>;

    /// Number of pending requests
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A queue that supports enqueue observers
pub trait ObservedMatchQueue: MatchQueue {
    fn subscribe(&self, observer: Arc<dyn MatchQueueObserver>) -> Result<Subscription>;
}
