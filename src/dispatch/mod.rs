//! Queue-driven matchmaking dispatch
//!
//! [`DispatchProcessor`] reacts to queue enqueue notifications by starting
//! short-lived workers that drain the queue through a matchmaker.

pub mod processor;
pub mod registry;

pub use processor::{DispatchConfig, DispatchProcessor, DispatchStats, ItemOutcome, StopOutcome};
pub use registry::{WorkerId, WorkerInfo, WorkerRegistry, WorkerState};
