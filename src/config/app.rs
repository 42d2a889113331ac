//! Main application configuration
//!
//! Configuration comes from defaults, an optional TOML file, environment
//! variables and finally command line overrides, in that order.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Interval between stats and gauge refreshes in seconds
    pub stats_interval_seconds: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Gap stored as the default setting when none exists yet
    pub default_max_rating_gap: f64,
    /// How long closing the dispatch processor waits for workers, in seconds
    pub worker_final_wait_seconds: u64,
    /// Seed demo ratings on startup
    pub seed_demo_data: bool,
    /// Number of demo users to seed
    pub demo_user_count: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "game-match".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
            stats_interval_seconds: 10,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            default_max_rating_gap: 0.0,
            worker_final_wait_seconds: 25,
            seed_demo_data: true,
            demo_user_count: 10,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", name, value)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment variable overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(port) = env_parse("HEALTH_PORT")? {
            self.service.health_port = port;
        }
        if let Some(timeout) = env_parse("SHUTDOWN_TIMEOUT_SECONDS")? {
            self.service.shutdown_timeout_seconds = timeout;
        }
        if let Some(interval) = env_parse("STATS_INTERVAL_SECONDS")? {
            self.service.stats_interval_seconds = interval;
        }

        // Matchmaking settings
        if let Some(gap) = env_parse("DEFAULT_MAX_RATING_GAP")? {
            self.matchmaking.default_max_rating_gap = gap;
        }
        if let Some(wait) = env_parse("WORKER_FINAL_WAIT_SECONDS")? {
            self.matchmaking.worker_final_wait_seconds = wait;
        }
        if let Some(seed) = env_parse("SEED_DEMO_DATA")? {
            self.matchmaking.seed_demo_data = seed;
        }
        if let Some(count) = env_parse("DEMO_USER_COUNT")? {
            self.matchmaking.demo_user_count = count;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.service.stats_interval_seconds)
    }

    /// Final wait used when closing the dispatch processor
    pub fn worker_final_wait(&self) -> Duration {
        Duration::from_secs(self.matchmaking.worker_final_wait_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.name.is_empty() {
        return Err(anyhow!("Service name cannot be empty"));
    }
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.stats_interval_seconds == 0 {
        return Err(anyhow!("Stats interval must be greater than 0"));
    }

    let gap = config.matchmaking.default_max_rating_gap;
    if !gap.is_finite() || gap < 0.0 {
        return Err(anyhow!(
            "Default max rating gap must be a finite non-negative number, got {}",
            gap
        ));
    }
    if config.matchmaking.worker_final_wait_seconds == 0 {
        return Err(anyhow!("Worker final wait must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.service.name, "game-match");
        assert_eq!(config.matchmaking.default_max_rating_gap, 0.0);
        assert_eq!(config.worker_final_wait(), Duration::from_secs(25));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.service.health_port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.matchmaking.default_max_rating_gap = -0.1;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.matchmaking.default_max_rating_gap = f64::NAN;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.matchmaking.worker_final_wait_seconds = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [service]
            health_port = 9191

            [matchmaking]
            default_max_rating_gap = 0.25
            demo_user_count = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.service.health_port, 9191);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.matchmaking.default_max_rating_gap, 0.25);
        assert_eq!(config.matchmaking.demo_user_count, 4);
        assert!(config.matchmaking.seed_demo_data);
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = AppConfig::from_file("/nonexistent/game-match.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
