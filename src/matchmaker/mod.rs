//! Matchmaking strategies
//!
//! A [`MatchMaker`] turns one dequeued [`MatchRequest`] into stored match
//! pairs. The dispatch pool calls it once per request.

pub mod band;
pub mod one_to_one;

pub use band::{rating_band, RatingBand};
pub use one_to_one::OneToOneMatchMaker;

use crate::error::Result;
use crate::types::{MatchDefinitionId, MatchRequest};
use async_trait::async_trait;

/// What a single matchmaking attempt produced
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The requester has no rating for the game type; nothing was stored
    Unrated,
    /// Candidates were searched under the given definition
    Matched {
        match_definition_id: MatchDefinitionId,
        /// False when an equivalent definition already existed
        definition_created: bool,
        /// Zero when nobody fell inside the band
        pairs_created: usize,
    },
}

/// Strategy for matching a request against stored ratings
#[async_trait]
pub trait MatchMaker: Send + Sync {
    async fn make_match(&self, request: &MatchRequest) -> Result<MatchOutcome>;
}
