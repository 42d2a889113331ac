//! Self-scaling dispatch processor
//!
//! The processor subscribes to an [`ObservedMatchQueue`] and starts one worker
//! task per enqueue notification. Each worker dequeues until the queue is empty
//! or shutdown begins, handing every request to the [`MatchMaker`]. A failing or
//! panicking request is logged and the worker moves on to the next one.
//!
//! Workers are tracked with a [`TaskTracker`] and shutdown is signalled with a
//! [`CancellationToken`]. Once shutdown begins no new workers start; running
//! workers finish their current request and exit.

use super::registry::{WorkerId, WorkerInfo, WorkerRegistry};
use crate::error::{MatchmakingError, Result};
use crate::matchmaker::{MatchMaker, MatchOutcome};
use crate::metrics::MetricsCollector;
use crate::queue::{MatchQueueObserver, ObservedMatchQueue, SubscriberId, Subscription};
use crate::types::{MatchDefinitionId, MatchRequest};
use crate::utils::generate_worker_id;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Dispatch processor configuration
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How long [`DispatchProcessor::close`] waits for remaining workers
    pub final_wait: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            final_wait: Duration::from_secs(25),
        }
    }
}

/// What happened to one dequeued request
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Matched {
        match_definition_id: MatchDefinitionId,
        pairs_created: usize,
    },
    /// The requester had no rating for the game type
    SkippedUnrated,
    /// The matchmaker returned an error or panicked
    Failed { reason: String },
}

impl ItemOutcome {
    /// Metric label for this outcome
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Matched { .. } => "matched",
            ItemOutcome::SkippedUnrated => "skipped_unrated",
            ItemOutcome::Failed { .. } => "failed",
        }
    }
}

/// Result of [`DispatchProcessor::stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Every worker finished before the deadline
    Drained,
    /// The deadline passed first; workers keep running in the background
    DeadlineExceeded { remaining_workers: usize },
}

/// Point-in-time processor statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatchStats {
    pub subscriber_id: SubscriberId,
    pub accepting: bool,
    pub active_workers: usize,
    pub queued_requests: usize,
    pub workers_spawned: u64,
    pub items_matched: u64,
    pub items_skipped: u64,
    pub items_failed: u64,
}

#[derive(Debug, Default)]
struct DispatchCounters {
    workers_spawned: AtomicU64,
    items_matched: AtomicU64,
    items_skipped: AtomicU64,
    items_failed: AtomicU64,
}

impl DispatchCounters {
    fn record(&self, outcome: &ItemOutcome) {
        let counter = match outcome {
            ItemOutcome::Matched { .. } => &self.items_matched,
            ItemOutcome::SkippedUnrated => &self.items_skipped,
            ItemOutcome::Failed { .. } => &self.items_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Queue-driven pool of matchmaking workers
pub struct DispatchProcessor {
    inner: Arc<DispatchInner>,
    subscription: Mutex<Option<Subscription>>,
    closed: AtomicBool,
}

/// State shared between the processor, its queue observer and its workers
struct DispatchInner {
    subscriber_id: SubscriberId,
    queue: Arc<dyn ObservedMatchQueue>,
    matchmaker: Arc<dyn MatchMaker>,
    metrics: Arc<MetricsCollector>,
    config: DispatchConfig,
    runtime: Handle,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    registry: WorkerRegistry,
    counters: DispatchCounters,
}

/// Queue observer that starts a worker per notification. Holds the shared
/// state weakly so the queue does not keep the processor alive.
struct EnqueueObserver {
    subscriber_id: SubscriberId,
    inner: Weak<DispatchInner>,
}

impl MatchQueueObserver for EnqueueObserver {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn on_match_enqueued(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.metrics.record_request_enqueued();
            DispatchInner::spawn_worker(&inner);
        }
    }
}

impl DispatchProcessor {
    /// Create a processor with its own metrics collector. Must be called from
    /// within a Tokio runtime; workers are spawned onto that runtime.
    pub fn new(
        queue: Arc<dyn ObservedMatchQueue>,
        matchmaker: Arc<dyn MatchMaker>,
        config: DispatchConfig,
    ) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);
        Self::with_metrics(queue, matchmaker, config, metrics)
    }

    /// Create a processor that reports into a shared metrics collector
    pub fn with_metrics(
        queue: Arc<dyn ObservedMatchQueue>,
        matchmaker: Arc<dyn MatchMaker>,
        config: DispatchConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| MatchmakingError::InternalError {
            message: format!("Dispatch processor requires a Tokio runtime: {}", e),
        })?;

        let registry = WorkerRegistry::new(metrics.dispatch().active_workers.clone());

        Ok(Self {
            inner: Arc::new(DispatchInner {
                subscriber_id: Uuid::new_v4(),
                queue,
                matchmaker,
                metrics,
                config,
                runtime,
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                registry,
                counters: DispatchCounters::default(),
            }),
            subscription: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Subscribe to the queue. Requests already waiting get a worker
    /// immediately. Calling `start` twice is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.inner.shutdown.is_cancelled() {
            return Err(MatchmakingError::InternalError {
                message: "Dispatch processor has already been stopped".to_string(),
            }
            .into());
        }

        let mut subscription = self
            .subscription
            .lock()
            .map_err(|_| MatchmakingError::lock_poisoned("dispatch subscription"))?;

        if subscription.is_some() {
            return Ok(());
        }

        let observer = Arc::new(EnqueueObserver {
            subscriber_id: self.inner.subscriber_id,
            inner: Arc::downgrade(&self.inner),
        });
        *subscription = Some(self.inner.queue.subscribe(observer)?);

        info!(
            "Dispatch processor {} subscribed to match queue",
            self.inner.subscriber_id
        );

        if !self.inner.queue.is_empty() {
            DispatchInner::spawn_worker(&self.inner);
        }

        Ok(())
    }

    /// Stop accepting work and wait for running workers until `cancel` fires.
    /// Never fails; a missed deadline is reported in the outcome.
    pub async fn stop(&self, cancel: CancellationToken) -> StopOutcome {
        self.stop_until(cancel.cancelled()).await
    }

    /// [`stop`](Self::stop) with a fixed deadline
    pub async fn stop_within(&self, deadline: Duration) -> StopOutcome {
        self.stop_until(tokio::time::sleep(deadline)).await
    }

    async fn stop_until<F>(&self, deadline: F) -> StopOutcome
    where
        F: Future<Output = ()>,
    {
        self.begin_shutdown();

        tokio::select! {
            biased;
            _ = self.inner.tracker.wait() => {
                info!("Dispatch processor {} drained", self.inner.subscriber_id);
                StopOutcome::Drained
            }
            _ = deadline => {
                let remaining_workers = self.active_workers();
                warn!(
                    "Stop deadline reached with {} dispatch workers still running",
                    remaining_workers
                );
                StopOutcome::DeadlineExceeded { remaining_workers }
            }
        }
    }

    /// Final teardown: stop accepting work and give remaining workers up to
    /// the configured final wait. Workers are never aborted. Returns whether
    /// all of them finished. Only the first call waits.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return self.active_workers() == 0;
        }

        self.begin_shutdown();

        if self.inner.tracker.is_empty() {
            return true;
        }

        match tokio::time::timeout(self.inner.config.final_wait, self.inner.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "Closing dispatch processor with {} workers still running",
                    self.active_workers()
                );
                false
            }
        }
    }

    fn begin_shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!(
                "Stopping dispatch processor {} with {} active workers",
                self.inner.subscriber_id,
                self.active_workers()
            );
        }

        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.unsubscribe();
    }

    fn unsubscribe(&self) {
        match self.subscription.lock() {
            Ok(mut subscription) => {
                if let Some(subscription) = subscription.take() {
                    subscription.unsubscribe();
                }
            }
            Err(_) => error!("Failed to acquire dispatch subscription lock"),
        }
    }

    /// Wait until the queue is empty and no worker is running, polling every
    /// few milliseconds. Returns false if `limit` passes first.
    pub async fn wait_until_idle(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;

        loop {
            if self.inner.queue.is_empty() && self.active_workers() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Whether enqueue notifications still start workers
    pub fn is_accepting(&self) -> bool {
        !self.inner.shutdown.is_cancelled()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    /// Number of worker tasks that have not yet finished
    pub fn active_workers(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Registered workers and their states
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.inner.registry.snapshot()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.inner.metrics.clone()
    }

    pub fn stats(&self) -> DispatchStats {
        let counters = &self.inner.counters;
        DispatchStats {
            subscriber_id: self.inner.subscriber_id,
            accepting: self.is_accepting(),
            active_workers: self.active_workers(),
            queued_requests: self.inner.queue.len(),
            workers_spawned: counters.workers_spawned.load(Ordering::Relaxed),
            items_matched: counters.items_matched.load(Ordering::Relaxed),
            items_skipped: counters.items_skipped.load(Ordering::Relaxed),
            items_failed: counters.items_failed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for DispatchProcessor {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
        self.unsubscribe();
    }
}

impl std::fmt::Debug for DispatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchProcessor")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("accepting", &self.is_accepting())
            .field("active_workers", &self.active_workers())
            .finish()
    }
}

impl DispatchInner {
    fn spawn_worker(this: &Arc<Self>) {
        if this.shutdown.is_cancelled() {
            debug!("Shutdown in progress, not starting a dispatch worker");
            return;
        }

        let worker_id = generate_worker_id();
        this.counters.workers_spawned.fetch_add(1, Ordering::Relaxed);
        this.metrics.record_worker_spawned();

        let inner = Arc::clone(this);
        this.tracker
            .spawn_on(inner.run_worker(worker_id), &this.runtime);
    }

    async fn run_worker(self: Arc<Self>, worker_id: WorkerId) {
        let started = Instant::now();
        let _registration = self.registry.register(worker_id);
        let mut processed = 0usize;

        debug!("Dispatch worker {} started", worker_id);

        loop {
            if self.shutdown.is_cancelled() {
                debug!(
                    "Dispatch worker {} observed shutdown after {} requests",
                    worker_id, processed
                );
                break;
            }

            let request = match self.queue.dequeue() {
                Ok(Some(request)) => request,
                Ok(None) => {
                    self.registry.mark_draining(worker_id);
                    break;
                }
                Err(e) => {
                    error!("Dispatch worker {} failed to dequeue: {}", worker_id, e);
                    break;
                }
            };

            self.process(worker_id, &request).await;
            processed += 1;
            tokio::task::yield_now().await;
        }

        self.metrics.update_queue_depth(self.queue.len());
        self.metrics.record_worker_finished(started.elapsed());
        debug!(
            "Dispatch worker {} finished after {} requests",
            worker_id, processed
        );
    }

    async fn process(&self, worker_id: WorkerId, request: &MatchRequest) -> ItemOutcome {
        let timer = self.metrics.start_timer();

        let result = AssertUnwindSafe(self.matchmaker.make_match(request))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(MatchOutcome::Unrated)) => ItemOutcome::SkippedUnrated,
            Ok(Ok(MatchOutcome::Matched {
                match_definition_id,
                definition_created,
                pairs_created,
            })) => {
                self.metrics
                    .record_match(request.game_type, definition_created, pairs_created);
                ItemOutcome::Matched {
                    match_definition_id,
                    pairs_created,
                }
            }
            Ok(Err(e)) => ItemOutcome::Failed {
                reason: format!("{:#}", e),
            },
            Err(payload) => ItemOutcome::Failed {
                reason: panic_message(payload.as_ref()),
            },
        };

        if let ItemOutcome::Failed { reason } = &outcome {
            error!(
                "Dispatch worker {} failed to match request from user {}: {}",
                worker_id, request.requesting_user_id, reason
            );
        }

        self.counters.record(&outcome);
        self.metrics
            .record_item_processed(outcome.label(), timer.stop());
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("matchmaker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("matchmaker panicked: {}", message)
    } else {
        "matchmaker panicked".to_string()
    }
}
