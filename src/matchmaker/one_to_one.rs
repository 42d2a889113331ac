//! One-to-one rating band matchmaker
//!
//! Pairs the requester with every other rated user of the same game whose
//! rating falls inside the requester's band. Each request records at most one
//! definition and one pair per candidate.

use super::{rating_band, MatchMaker, MatchOutcome};
use crate::error::{MatchmakingError, Result};
use crate::storage::{MatchDefinitionStore, MatchPairStore, RatingStore, SettingsStore};
use crate::types::{MatchDefinition, MatchPair, MatchRequest};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub struct OneToOneMatchMaker {
    ratings: Arc<dyn RatingStore>,
    settings: Arc<dyn SettingsStore>,
    definitions: Arc<dyn MatchDefinitionStore>,
    pairs: Arc<dyn MatchPairStore>,
}

impl OneToOneMatchMaker {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        settings: Arc<dyn SettingsStore>,
        definitions: Arc<dyn MatchDefinitionStore>,
        pairs: Arc<dyn MatchPairStore>,
    ) -> Self {
        Self {
            ratings,
            settings,
            definitions,
            pairs,
        }
    }

    /// The request's own gap, or the stored default when it has none
    fn effective_gap(&self, request: &MatchRequest) -> Result<f64> {
        if let Some(gap) = request.max_rating_gap {
            return Ok(gap);
        }

        self.settings
            .default_setting()?
            .map(|s| s.default_max_rating_gap)
            .ok_or_else(|| MatchmakingError::SettingMissing.into())
    }
}

impl std::fmt::Debug for OneToOneMatchMaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneToOneMatchMaker").finish_non_exhaustive()
    }
}

#[async_trait]
impl MatchMaker for OneToOneMatchMaker {
    async fn make_match(&self, request: &MatchRequest) -> Result<MatchOutcome> {
        request.validate()?;

        let Some(requester) = self
            .ratings
            .get_by_user_game_type(request.requesting_user_id, request.game_type)?
        else {
            warn!(
                "User {} has no {} rating, skipping match request",
                request.requesting_user_id, request.game_type
            );
            return Ok(MatchOutcome::Unrated);
        };

        let gap = self.effective_gap(request)?;
        let insert = self.definitions.add_ignore(MatchDefinition::new(
            request.game_type,
            request.match_type,
            gap,
        ))?;

        let band = rating_band(requester.rating, gap, request.match_type);
        let candidates = self.ratings.find_in_range(
            request.game_type,
            band.as_range(),
            request.requesting_user_id,
        )?;

        for candidate in &candidates {
            self.pairs
                .add(MatchPair::new(insert.id(), &requester, candidate))?;
        }

        info!(
            "Matched user {} ({} {}, gap {}) against {} candidates in [{}, {}]",
            request.requesting_user_id,
            request.game_type,
            request.match_type,
            gap,
            candidates.len(),
            band.lower,
            band.upper
        );

        Ok(MatchOutcome::Matched {
            match_definition_id: insert.id(),
            definition_created: insert.was_inserted(),
            pairs_created: candidates.len(),
        })
    }
}
