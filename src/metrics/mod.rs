//! Metrics and monitoring for the game-match service
//!
//! Prometheus metrics collection plus the HTTP server exposing health probes,
//! metrics and dispatch statistics.

pub mod collector;
pub mod health;

pub use collector::{
    DispatchMetrics, MatchMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics,
    ServiceMetrics,
};
pub use health::{encode_metrics, HealthServer, HealthServerConfig};
