//! Metrics collection using Prometheus
//!
//! Counters and gauges for the match queue, the dispatch worker pool and the
//! matchmaker. All metrics are registered in the collector's own registry.

use crate::types::GameType;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service_metrics: ServiceMetrics,
    dispatch_metrics: DispatchMetrics,
    match_metrics: MatchMetrics,
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue and worker pool metrics
#[derive(Clone)]
pub struct DispatchMetrics {
    /// Total match requests enqueued
    pub requests_enqueued_total: IntCounter,

    /// Requests waiting in the queue
    pub queue_depth: IntGauge,

    /// Total workers started
    pub workers_spawned_total: IntCounter,

    /// Workers currently registered
    pub active_workers: IntGauge,

    /// Dequeued requests by outcome
    pub items_processed_total: IntCounterVec,
}

/// Matchmaking result metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Definition lookups by result (created, reused)
    pub definitions_total: IntCounterVec,

    /// Pairs stored by game type
    pub pairs_created_total: IntCounterVec,

    /// Candidates found per matched request
    pub candidates_per_request: Histogram,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time spent on one dequeued request
    pub matchmaking_duration: Histogram,

    /// How long workers live before the queue drains
    pub worker_lifetime: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let dispatch_metrics = DispatchMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            dispatch_metrics,
            match_metrics,
            performance_metrics,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn dispatch(&self) -> &DispatchMetrics {
        &self.dispatch_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a request arriving on the queue
    pub fn record_request_enqueued(&self) {
        self.dispatch_metrics.requests_enqueued_total.inc();
    }

    pub fn update_queue_depth(&self, depth: usize) {
        self.dispatch_metrics.queue_depth.set(depth as i64);
    }

    pub fn record_worker_spawned(&self) {
        self.dispatch_metrics.workers_spawned_total.inc();
    }

    /// Record a worker exiting after `lifetime`
    pub fn record_worker_finished(&self, lifetime: Duration) {
        self.performance_metrics
            .worker_lifetime
            .observe(lifetime.as_secs_f64());
    }

    /// Record one dequeued request and how long it took
    pub fn record_item_processed(&self, outcome: &str, duration: Duration) {
        self.dispatch_metrics
            .items_processed_total
            .with_label_values(&[outcome])
            .inc();

        self.performance_metrics
            .matchmaking_duration
            .observe(duration.as_secs_f64());
    }

    /// Record what a successful matchmaking attempt stored
    pub fn record_match(&self, game_type: GameType, definition_created: bool, pairs_created: usize) {
        let result = if definition_created { "created" } else { "reused" };
        self.match_metrics
            .definitions_total
            .with_label_values(&[result])
            .inc();

        let game_type_label = game_type.to_string().to_lowercase();
        self.match_metrics
            .pairs_created_total
            .with_label_values(&[game_type_label.as_str()])
            .inc_by(pairs_created as u64);

        self.match_metrics
            .candidates_per_request
            .observe(pairs_created as f64);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("game_match_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "game_match_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("game_match_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl DispatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let requests_enqueued_total = IntCounter::new(
            "game_match_requests_enqueued_total",
            "Total match requests enqueued",
        )?;
        registry.register(Box::new(requests_enqueued_total.clone()))?;

        let queue_depth = IntGauge::new(
            "game_match_queue_depth",
            "Match requests waiting in the queue",
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        let workers_spawned_total = IntCounter::new(
            "game_match_workers_spawned_total",
            "Total dispatch workers started",
        )?;
        registry.register(Box::new(workers_spawned_total.clone()))?;

        let active_workers = IntGauge::new(
            "game_match_active_workers",
            "Dispatch workers currently registered",
        )?;
        registry.register(Box::new(active_workers.clone()))?;

        let items_processed_total = IntCounterVec::new(
            Opts::new(
                "game_match_items_processed_total",
                "Dequeued match requests by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(items_processed_total.clone()))?;

        Ok(Self {
            requests_enqueued_total,
            queue_depth,
            workers_spawned_total,
            active_workers,
            items_processed_total,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let definitions_total = IntCounterVec::new(
            Opts::new(
                "game_match_definitions_total",
                "Match definition lookups by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(definitions_total.clone()))?;

        let pairs_created_total = IntCounterVec::new(
            Opts::new("game_match_pairs_created_total", "Total match pairs stored"),
            &["game_type"],
        )?;
        registry.register(Box::new(pairs_created_total.clone()))?;

        let candidates_per_request = Histogram::with_opts(
            HistogramOpts::new(
                "game_match_candidates_per_request",
                "Candidates paired per matched request",
            )
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0]),
        )?;
        registry.register(Box::new(candidates_per_request.clone()))?;

        Ok(Self {
            definitions_total,
            pairs_created_total,
            candidates_per_request,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matchmaking_duration = Histogram::with_opts(
            HistogramOpts::new(
                "game_match_matchmaking_duration_seconds",
                "Time spent matching one request",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(matchmaking_duration.clone()))?;

        let worker_lifetime = Histogram::with_opts(
            HistogramOpts::new(
                "game_match_worker_lifetime_seconds",
                "Dispatch worker lifetime",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(worker_lifetime.clone()))?;

        Ok(Self {
            matchmaking_duration,
            worker_lifetime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _dispatch = collector.dispatch();
        let _matches = collector.matches();
        let _performance = collector.performance();
    }

    #[test]
    fn test_dispatch_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_request_enqueued();
        collector.record_request_enqueued();
        collector.record_worker_spawned();
        collector.record_item_processed("matched", Duration::from_millis(3));
        collector.record_item_processed("failed", Duration::from_millis(1));
        collector.update_queue_depth(7);

        let dispatch = collector.dispatch();
        assert_eq!(dispatch.requests_enqueued_total.get(), 2);
        assert_eq!(dispatch.workers_spawned_total.get(), 1);
        assert_eq!(dispatch.queue_depth.get(), 7);
        assert_eq!(
            dispatch
                .items_processed_total
                .with_label_values(&["matched"])
                .get(),
            1
        );
    }

    #[test]
    fn test_match_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_match(GameType::Chess, true, 3);
        collector.record_match(GameType::Chess, false, 2);

        let matches = collector.matches();
        assert_eq!(
            matches.definitions_total.with_label_values(&["created"]).get(),
            1
        );
        assert_eq!(
            matches.definitions_total.with_label_values(&["reused"]).get(),
            1
        );
        assert_eq!(
            matches.pairs_created_total.with_label_values(&["chess"]).get(),
            5
        );
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.update_health_status(2);
        collector.update_component_health("dispatch_processor", true);
        collector.update_component_health("storage", false);
        assert_eq!(collector.service().health_status.get(), 2);
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.elapsed();

        assert!(duration >= Duration::from_millis(10));

        let final_duration = timer.stop();
        assert!(final_duration >= Duration::from_millis(10));
    }
}
