//! Game Match - rating-band matchmaking service
//!
//! Match requests go into an observed FIFO queue. A self-scaling pool of
//! dispatch workers drains the queue and pairs each requester with every
//! rated user inside a rating band, storing deduplicated match definitions
//! and the resulting match pairs for later reporting.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod matchmaker;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use dispatch::{DispatchConfig, DispatchProcessor, StopOutcome};
pub use matchmaker::{MatchMaker, MatchOutcome, OneToOneMatchMaker};
pub use queue::{InMemoryMatchQueue, MatchQueue, ObservedMatchQueue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
