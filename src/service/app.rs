//! Main application state and service coordination
//!
//! [`AppState`] owns the stores, the match queue, the matchmaker and the
//! dispatch processor, plus the health server and background tasks that
//! surround them.

use crate::config::AppConfig;
use crate::dispatch::{DispatchConfig, DispatchProcessor, StopOutcome};
use crate::error::Result as MatchmakingResult;
use crate::matchmaker::{MatchMaker, OneToOneMatchMaker};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::queue::{InMemoryMatchQueue, MatchQueue};
use crate::service::seed::DemoDataSeeder;
use crate::storage::{
    InMemoryMatchDefinitionStore, InMemoryMatchPairStore, InMemoryRatingStore,
    InMemorySettingsStore, MatchDefinitionStore, MatchPairStore, RatingStore, SettingsStore,
};
use crate::types::{MatchQuery, MatchRequest, MatchResponse, UserId};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state
pub struct AppState {
    config: AppConfig,

    ratings: Arc<dyn RatingStore>,
    settings: Arc<dyn SettingsStore>,
    definitions: Arc<dyn MatchDefinitionStore>,
    pairs: Arc<dyn MatchPairStore>,

    queue: Arc<InMemoryMatchQueue>,
    processor: Arc<DispatchProcessor>,
    metrics_collector: Arc<MetricsCollector>,

    /// Present while the health server runs; holds a reference back to this state
    health_server: Mutex<Option<Arc<HealthServer>>>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl AppState {
    /// Build all components. Must run inside a Tokio runtime.
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} matchmaking service", config.service.name);
        info!(
            "Configuration: default_max_rating_gap={}, worker_final_wait={}s, seed_demo_data={}",
            config.matchmaking.default_max_rating_gap,
            config.matchmaking.worker_final_wait_seconds,
            config.matchmaking.seed_demo_data
        );

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let ratings: Arc<dyn RatingStore> = Arc::new(InMemoryRatingStore::new());
        let settings: Arc<dyn SettingsStore> = Arc::new(InMemorySettingsStore::new());
        let definitions: Arc<dyn MatchDefinitionStore> =
            Arc::new(InMemoryMatchDefinitionStore::new());
        let pairs: Arc<dyn MatchPairStore> =
            Arc::new(InMemoryMatchPairStore::new(definitions.clone()));

        let matchmaker: Arc<dyn MatchMaker> = Arc::new(OneToOneMatchMaker::new(
            ratings.clone(),
            settings.clone(),
            definitions.clone(),
            pairs.clone(),
        ));

        let queue = Arc::new(InMemoryMatchQueue::new());
        let processor = Arc::new(
            DispatchProcessor::with_metrics(
                queue.clone(),
                matchmaker,
                DispatchConfig {
                    final_wait: config.worker_final_wait(),
                },
                metrics_collector.clone(),
            )
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create dispatch processor: {}", e),
            })?,
        );

        Ok(Self {
            config,
            ratings,
            settings,
            definitions,
            pairs,
            queue,
            processor,
            metrics_collector,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Seed data, start the dispatch processor, the health server and
    /// background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        if self.is_running().await {
            warn!("Service already running");
            return Ok(());
        }

        info!("Starting {} matchmaking service", self.config.service.name);

        self.prepare_data()?;

        self.processor
            .start()
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to start dispatch processor: {}", e),
            })?;
        info!("✅ Dispatch processor subscribed to match queue");

        *self.is_running.write().await = true;

        self.start_health_server().await;
        self.start_background_tasks().await;

        info!("✅ Matchmaking service started successfully");
        Ok(())
    }

    /// Stop accepting work, wait for dispatch workers, then stop the health
    /// server and background tasks
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        *self.is_running.write().await = false;

        match self
            .processor
            .stop_within(self.config.shutdown_timeout())
            .await
        {
            StopOutcome::Drained => info!("✅ Dispatch workers drained"),
            StopOutcome::DeadlineExceeded { remaining_workers } => warn!(
                "Shutdown timeout reached with {} dispatch workers still running",
                remaining_workers
            ),
        }

        if !self.processor.close().await {
            warn!("Dispatch processor closed with workers still running");
        }

        if let Some(server) = self.health_server.lock().await.take() {
            info!("Stopping health server...");
            if let Err(e) = server.stop().await {
                warn!("Failed to stop health server: {}", e);
            }
        }

        self.stop_background_tasks().await;

        let stats = self.processor.stats();
        info!(
            "Final dispatch statistics: matched={}, skipped={}, failed={}, left in queue={}",
            stats.items_matched, stats.items_skipped, stats.items_failed, stats.queued_requests
        );
        info!("✅ Service shutdown completed");

        Ok(())
    }

    /// Validate and enqueue a match request
    pub fn enqueue_match(&self, request: MatchRequest) -> MatchmakingResult<()> {
        request.validate()?;
        self.queue.enqueue(request)
    }

    /// Collected match report
    pub fn query_matches(
        &self,
        user_id: Option<UserId>,
        query: &MatchQuery,
    ) -> MatchmakingResult<Vec<MatchResponse>> {
        self.pairs.query_by_request(user_id, query)?.collect()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn ratings(&self) -> Arc<dyn RatingStore> {
        self.ratings.clone()
    }

    pub fn settings(&self) -> Arc<dyn SettingsStore> {
        self.settings.clone()
    }

    pub fn definitions(&self) -> Arc<dyn MatchDefinitionStore> {
        self.definitions.clone()
    }

    pub fn pairs(&self) -> Arc<dyn MatchPairStore> {
        self.pairs.clone()
    }

    pub fn queue(&self) -> Arc<dyn MatchQueue> {
        self.queue.clone()
    }

    pub fn processor(&self) -> Arc<DispatchProcessor> {
        self.processor.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Ensure a default setting exists and seed demo users when enabled
    fn prepare_data(&self) -> Result<(), ServiceError> {
        let storage_error = |e: anyhow::Error| ServiceError::Storage {
            message: e.to_string(),
        };
        let matchmaking = &self.config.matchmaking;

        if matchmaking.seed_demo_data {
            DemoDataSeeder::new(matchmaking.demo_user_count, matchmaking.default_max_rating_gap)
                .seed(self.ratings.as_ref(), self.settings.as_ref())
                .map_err(storage_error)?;
        } else if self.settings.default_setting().map_err(storage_error)?.is_none() {
            self.settings
                .update_default_gap(matchmaking.default_max_rating_gap)
                .map_err(storage_error)?;
            info!(
                "Stored default max rating gap {}",
                matchmaking.default_max_rating_gap
            );
        }

        Ok(())
    }

    async fn start_health_server(self: &Arc<Self>) {
        let port = self.config.service.health_port;
        info!("Starting health and metrics endpoints on port {}", port);

        let server = Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port,
                    host: "0.0.0.0".to_string(),
                },
                self.metrics_collector.clone(),
            )
            .with_app_state(Arc::clone(self)),
        );
        *self.health_server.lock().await = Some(server.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Health server failed: {}", e);
            } else {
                info!("Health server task completed");
            }
        });
        self.background_tasks.lock().await.push(handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    async fn start_background_tasks(&self) {
        let stats_interval = self.config.stats_interval();
        info!(
            "Starting stats refresh task ({}s interval)...",
            stats_interval.as_secs()
        );

        let stats_task = {
            let processor = self.processor.clone();
            let queue = self.queue.clone();
            let metrics_collector = self.metrics_collector.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(stats_interval);
                info!("Stats refresh task started");

                while *is_running.read().await {
                    interval.tick().await;

                    let stats = processor.stats();
                    metrics_collector.update_queue_depth(queue.len());
                    metrics_collector.update_uptime(started_at.elapsed());
                    metrics_collector.update_component_health("dispatch_processor", stats.accepting);
                    metrics_collector.update_health_status(if stats.accepting { 2 } else { 0 });

                    debug!(
                        "Dispatch stats - workers: {}, queued: {}, matched: {}, failed: {}",
                        stats.active_workers,
                        stats.queued_requests,
                        stats.items_matched,
                        stats.items_failed
                    );
                }

                info!("Stats refresh task stopped");
            })
        };

        self.background_tasks.lock().await.push(stats_task);
    }

    async fn stop_background_tasks(&self) {
        let tasks: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.into_iter().enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Background task {} ended with error: {}", i + 1, e);
                }
            }
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
