//! Live worker bookkeeping
//!
//! Each dispatch worker registers itself for its lifetime. The entry is
//! removed by [`WorkerRegistration`]'s `Drop`, so a worker that unwinds still
//! leaves the registry consistent.

use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use prometheus::IntGauge;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;

/// Unique identifier for dispatch workers
pub type WorkerId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    /// Dequeuing and processing requests
    Running,
    /// Found the queue empty and is exiting
    Draining,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerInfo {
    pub worker_id: WorkerId,
    pub state: WorkerState,
    pub started_at: DateTime<Utc>,
}

/// Thread-safe map of live workers
pub struct WorkerRegistry {
    workers: Mutex<HashMap<WorkerId, WorkerInfo>>,
    active_gauge: IntGauge,
}

impl WorkerRegistry {
    /// Registry that mirrors its size into `active_gauge`
    pub fn new(active_gauge: IntGauge) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            active_gauge,
        }
    }

    /// Apply `change` under the lock. A failed attempt clears the poison flag
    /// and is retried once; a second failure is logged and skipped.
    fn mutate<T>(
        &self,
        action: &str,
        worker_id: WorkerId,
        change: impl Fn(&mut HashMap<WorkerId, WorkerInfo>) -> T,
    ) -> Option<T> {
        for attempt in 1..=2 {
            match self.workers.lock() {
                Ok(mut workers) => {
                    let result = change(&mut workers);
                    self.active_gauge.set(workers.len() as i64);
                    return Some(result);
                }
                Err(_) if attempt == 1 => {
                    warn!(
                        "Worker registry lock poisoned during {} of worker {}, retrying",
                        action, worker_id
                    );
                    self.workers.clear_poison();
                }
                Err(_) => {
                    error!(
                        "Failed to {} worker {} after retry, registry may be stale",
                        action, worker_id
                    );
                }
            }
        }
        None
    }

    /// Register a worker as running. The returned guard deregisters on drop.
    pub fn register(&self, worker_id: WorkerId) -> WorkerRegistration<'_> {
        self.mutate("register", worker_id, |workers| {
            workers.insert(
                worker_id,
                WorkerInfo {
                    worker_id,
                    state: WorkerState::Running,
                    started_at: current_timestamp(),
                },
            );
        });

        WorkerRegistration {
            registry: self,
            worker_id,
        }
    }

    /// Removing an unknown worker is a no-op
    pub fn deregister(&self, worker_id: WorkerId) -> bool {
        self.mutate("deregister", worker_id, |workers| {
            workers.remove(&worker_id).is_some()
        })
        .unwrap_or(false)
    }

    pub fn mark_draining(&self, worker_id: WorkerId) {
        self.mutate("update", worker_id, |workers| {
            if let Some(info) = workers.get_mut(&worker_id) {
                info.state = WorkerState::Draining;
            }
        });
    }

    pub fn len(&self) -> usize {
        self.workers
            .lock()
            .map(|w| w.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current entries
    pub fn snapshot(&self) -> Vec<WorkerInfo> {
        self.workers
            .lock()
            .map(|w| w.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("workers", &self.len())
            .finish()
    }
}

/// Keeps a worker registered until dropped
#[derive(Debug)]
pub struct WorkerRegistration<'a> {
    registry: &'a WorkerRegistry,
    worker_id: WorkerId,
}

impl WorkerRegistration<'_> {
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }
}

impl Drop for WorkerRegistration<'_> {
    fn drop(&mut self) {
        self.registry.deregister(self.worker_id);
    }
}
