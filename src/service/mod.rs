//! Service layer for the game-match matchmaking service
//!
//! Application state, health checks, demo data seeding and background task
//! management for the production service.

pub mod app;
pub mod health;
pub mod seed;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use seed::DemoDataSeeder;
