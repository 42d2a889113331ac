//! Common types used throughout the matchmaking service

use crate::error::{MatchmakingError, Result};
use crate::utils::{current_timestamp, generate_record_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for users
pub type UserId = Uuid;

/// Unique identifier for stored match definitions
pub type MatchDefinitionId = Uuid;

/// Unique identifier for stored match pairs
pub type MatchPairId = Uuid;

/// Unique identifier for stored user ratings
pub type RatingId = Uuid;

/// Game a rating or match request applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    Chess,
    Checkers,
    Backgammon,
    Go,
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameType::Chess => write!(f, "Chess"),
            GameType::Checkers => write!(f, "Checkers"),
            GameType::Backgammon => write!(f, "Backgammon"),
            GameType::Go => write!(f, "Go"),
        }
    }
}

impl std::str::FromStr for GameType {
    type Err = MatchmakingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chess" => Ok(GameType::Chess),
            "checkers" => Ok(GameType::Checkers),
            "backgammon" => Ok(GameType::Backgammon),
            "go" => Ok(GameType::Go),
            other => Err(MatchmakingError::InvalidMatchRequest {
                reason: format!("Unknown game type '{}'", other),
            }),
        }
    }
}

/// Which side of the requester's rating opponents may come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    #[default]
    Any,
    EasierOnly,
    HarderOnly,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchType::Any => write!(f, "Any"),
            MatchType::EasierOnly => write!(f, "EasierOnly"),
            MatchType::HarderOnly => write!(f, "HarderOnly"),
        }
    }
}

impl std::str::FromStr for MatchType {
    type Err = MatchmakingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "any" => Ok(MatchType::Any),
            "easieronly" | "easier" => Ok(MatchType::EasierOnly),
            "harderonly" | "harder" => Ok(MatchType::HarderOnly),
            other => Err(MatchmakingError::InvalidMatchRequest {
                reason: format!("Unknown match type '{}'", other),
            }),
        }
    }
}

/// Request to find opponents for a user. Lives for one dispatch cycle only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub requesting_user_id: UserId,
    pub game_type: GameType,
    pub match_type: MatchType,
    /// Explicit gap; the process-wide default applies when absent
    pub max_rating_gap: Option<f64>,
    pub requested_at: DateTime<Utc>,
}

impl MatchRequest {
    /// Create a request that uses the default rating gap
    pub fn new(requesting_user_id: UserId, game_type: GameType, match_type: MatchType) -> Self {
        Self {
            requesting_user_id,
            game_type,
            match_type,
            max_rating_gap: None,
            requested_at: current_timestamp(),
        }
    }

    /// Set an explicit maximum rating gap
    pub fn with_max_rating_gap(mut self, gap: f64) -> Self {
        self.max_rating_gap = Some(gap);
        self
    }

    /// Reject requests whose explicit gap is NaN or infinite
    pub fn validate(&self) -> Result<()> {
        if let Some(gap) = self.max_rating_gap {
            if !gap.is_finite() {
                return Err(MatchmakingError::InvalidMatchRequest {
                    reason: format!("max_rating_gap must be finite, got {}", gap),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Deduplicated parameters under which match pairs were produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDefinition {
    pub id: MatchDefinitionId,
    pub game_type: GameType,
    pub match_type: MatchType,
    pub max_rating_gap: f64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl MatchDefinition {
    pub fn new(game_type: GameType, match_type: MatchType, max_rating_gap: f64) -> Self {
        let now = current_timestamp();
        Self {
            id: generate_record_id(),
            game_type,
            match_type,
            max_rating_gap,
            created_at: now,
            modified_at: now,
        }
    }
}

/// One concrete pairing between a requester and a candidate opponent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    pub id: MatchPairId,
    pub match_definition_id: MatchDefinitionId,
    pub requesting_user_id: UserId,
    pub requesting_user_rating: f64,
    pub matched_user_id: UserId,
    pub matched_user_rating: f64,
    pub created_at: DateTime<Utc>,
}

impl MatchPair {
    /// Pair a requester with a candidate under the given definition
    pub fn new(
        match_definition_id: MatchDefinitionId,
        requester: &UserRating,
        candidate: &UserRating,
    ) -> Self {
        Self {
            id: generate_record_id(),
            match_definition_id,
            requesting_user_id: requester.user_id,
            requesting_user_rating: requester.rating,
            matched_user_id: candidate.user_id,
            matched_user_rating: candidate.rating,
            created_at: current_timestamp(),
        }
    }

    /// Whether the user took part in this pair on either side
    pub fn involves(&self, user_id: UserId) -> bool {
        self.requesting_user_id == user_id || self.matched_user_id == user_id
    }
}

/// A user's rating for a single game type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRating {
    pub id: RatingId,
    pub user_id: UserId,
    pub game_type: GameType,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl UserRating {
    pub fn new(user_id: UserId, game_type: GameType, rating: f64) -> Self {
        let now = current_timestamp();
        Self {
            id: generate_record_id(),
            user_id,
            game_type,
            rating,
            created_at: now,
            modified_at: now,
        }
    }
}

/// Process-wide matchmaking defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultSetting {
    pub id: Uuid,
    pub default_max_rating_gap: f64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl DefaultSetting {
    pub fn new(default_max_rating_gap: f64) -> Self {
        let now = current_timestamp();
        Self {
            id: generate_record_id(),
            default_max_rating_gap,
            created_at: now,
            modified_at: now,
        }
    }
}

/// Filter and paging for match reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchQuery {
    pub game_type: Option<GameType>,
    pub match_type: Option<MatchType>,
    /// Only definitions whose gap is at most this value
    pub max_rating_gap: Option<f64>,
    /// Number of pair rows to skip across all definitions
    pub skip: i64,
    /// Maximum number of pair rows; non-positive means the default of 100
    pub take: i64,
}

/// Pairs produced under one definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub game_type: GameType,
    pub match_type: MatchType,
    pub max_rating_gap: f64,
    pub matches: Vec<MatchPairResponse>,
}

/// Reporting view of a single pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPairResponse {
    pub requesting_user_id: UserId,
    pub requesting_user_rating: f64,
    pub matched_user_id: UserId,
    pub matched_user_rating: f64,
    pub match_date: DateTime<Utc>,
}

impl From<&MatchPair> for MatchPairResponse {
    fn from(pair: &MatchPair) -> Self {
        Self {
            requesting_user_id: pair.requesting_user_id,
            requesting_user_rating: pair.requesting_user_rating,
            matched_user_id: pair.matched_user_id,
            matched_user_rating: pair.matched_user_rating,
            match_date: pair.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_request_defaults_to_setting_gap() {
        let request = MatchRequest::new(Uuid::new_v4(), GameType::Chess, MatchType::Any);
        assert!(request.max_rating_gap.is_none());
        assert!(request.validate().is_ok());

        let request = request.with_max_rating_gap(0.25);
        assert_eq!(request.max_rating_gap, Some(0.25));
    }

    #[test]
    fn test_non_finite_gap_rejected() {
        let request = MatchRequest::new(Uuid::new_v4(), GameType::Go, MatchType::HarderOnly)
            .with_max_rating_gap(f64::NAN);
        assert!(request.validate().is_err());

        let request = MatchRequest::new(Uuid::new_v4(), GameType::Go, MatchType::HarderOnly)
            .with_max_rating_gap(f64::INFINITY);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("chess".parse::<GameType>().unwrap(), GameType::Chess);
        assert_eq!("Backgammon".parse::<GameType>().unwrap(), GameType::Backgammon);
        assert!("poker".parse::<GameType>().is_err());

        assert_eq!("any".parse::<MatchType>().unwrap(), MatchType::Any);
        assert_eq!("easier-only".parse::<MatchType>().unwrap(), MatchType::EasierOnly);
        assert_eq!("HarderOnly".parse::<MatchType>().unwrap(), MatchType::HarderOnly);
        assert!("sideways".parse::<MatchType>().is_err());
    }

    #[test]
    fn test_pair_involves_both_sides() {
        let requester = UserRating::new(Uuid::new_v4(), GameType::Chess, 1.0);
        let candidate = UserRating::new(Uuid::new_v4(), GameType::Chess, 1.1);
        let pair = MatchPair::new(Uuid::new_v4(), &requester, &candidate);

        assert!(pair.involves(requester.user_id));
        assert!(pair.involves(candidate.user_id));
        assert!(!pair.involves(Uuid::new_v4()));
        assert_eq!(pair.requesting_user_rating, 1.0);
        assert_eq!(pair.matched_user_rating, 1.1);
    }
}
