//! Rating band calculation

use crate::types::MatchType;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Inclusive rating interval an opponent must fall inside
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingBand {
    pub lower: f64,
    pub upper: f64,
}

impl RatingBand {
    pub fn contains(&self, rating: f64) -> bool {
        self.lower <= rating && rating <= self.upper
    }

    pub fn as_range(&self) -> RangeInclusive<f64> {
        self.lower..=self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Band of acceptable opponent ratings around `rating`.
///
/// The gap's sign is ignored. `EasierOnly` keeps the lower half of the band,
/// `HarderOnly` the upper half; both include the requester's own rating.
pub fn rating_band(rating: f64, max_rating_gap: f64, match_type: MatchType) -> RatingBand {
    let gap = max_rating_gap.abs();

    match match_type {
        MatchType::Any => RatingBand {
            lower: rating - gap,
            upper: rating + gap,
        },
        MatchType::EasierOnly => RatingBand {
            lower: rating - gap,
            upper: rating,
        },
        MatchType::HarderOnly => RatingBand {
            lower: rating,
            upper: rating + gap,
        },
    }
}
