//! Configuration management for the game-match service
//!
//! This module handles configuration loading from files and environment
//! variables, validation, and default values.

pub mod app;

pub use app::{validate_config, AppConfig, MatchmakingSettings, ServiceSettings};
