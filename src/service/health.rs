//! Health checks and service statistics
//!
//! Readiness and liveness probes plus the detailed report behind `/stats`.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Value exported through the health status gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    /// Worst of two statuses
    fn combine(self, other: &HealthStatus) -> HealthStatus {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_workers: usize,
    pub queued_requests: usize,
    pub workers_spawned: u64,
    pub items_matched: u64,
    pub items_skipped: u64,
    pub items_failed: u64,
    pub match_definitions: usize,
    pub match_pairs: usize,
    pub rated_users: usize,
    pub uptime_info: String,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(&app_state).await,
            Self::check_dispatch_processor(&app_state),
            Self::check_storage(&app_state),
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |status, check| {
                status.combine(&check.status)
            });

        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(&app_state),
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify enqueued requests will be processed
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_dispatch_processor(&app_state).status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_dispatch_processor(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let processor = app_state.processor();

        let (status, message) = if !processor.is_accepting() {
            (
                HealthStatus::Unhealthy,
                Some("Dispatch processor is shutting down".to_string()),
            )
        } else if !processor.is_subscribed() {
            (
                HealthStatus::Degraded,
                Some("Dispatch processor is not subscribed to the queue".to_string()),
            )
        } else {
            (HealthStatus::Healthy, None)
        };

        ComponentCheck {
            name: "dispatch_processor".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_storage(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let result = app_state
            .settings()
            .default_setting()
            .and_then(|setting| Ok((setting, app_state.pairs().count()?)));

        let (status, message) = match result {
            Ok((Some(_), _)) => (HealthStatus::Healthy, None),
            Ok((None, _)) => (
                HealthStatus::Degraded,
                Some("No default setting stored".to_string()),
            ),
            Err(e) => {
                error!("Storage health check failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        };

        ComponentCheck {
            name: "storage".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Gather current service statistics
    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let dispatch = app_state.processor().stats();

        ServiceStats {
            active_workers: dispatch.active_workers,
            queued_requests: dispatch.queued_requests,
            workers_spawned: dispatch.workers_spawned,
            items_matched: dispatch.items_matched,
            items_skipped: dispatch.items_skipped,
            items_failed: dispatch.items_failed,
            match_definitions: app_state.definitions().count().unwrap_or(0),
            match_pairs: app_state.pairs().count().unwrap_or(0),
            rated_users: app_state.ratings().count().unwrap_or(0),
            uptime_info: format!("Up {}s", app_state.uptime().as_secs()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
