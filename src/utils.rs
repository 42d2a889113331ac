//! Utility functions for the matchmaking service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Two rating gaps closer than this are the same definition key
pub const RATING_GAP_TOLERANCE: f64 = 1e-7;

/// Generate a new unique record ID
pub fn generate_record_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique worker ID
pub fn generate_worker_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: f64, rating2: f64) -> f64 {
    (rating1 - rating2).abs()
}

/// Tolerance-based equality for rating gaps
pub fn gaps_equal(gap1: f64, gap2: f64) -> bool {
    rating_difference(gap1, gap2) < RATING_GAP_TOLERANCE
}
