//! Per-game user rating storage
//!
//! Ratings are plain floats keyed by `(user, game type)`. The matchmaker reads
//! them through [`RatingStore`]; seeding and admin tooling write them with
//! [`RatingStore::upsert`].

use super::memory::InMemoryStore;
use crate::error::Result;
use crate::types::{GameType, RatingId, UserId, UserRating};
use std::ops::RangeInclusive;

/// Trait for rating storage operations
pub trait RatingStore: Send + Sync {
    /// Get a user's rating for one game type
    fn get_by_user_game_type(
        &self,
        user_id: UserId,
        game_type: GameType,
    ) -> Result<Option<UserRating>>;

    /// Ratings for `game_type` inside the inclusive `range`, excluding one user
    fn find_in_range(
        &self,
        game_type: GameType,
        range: RangeInclusive<f64>,
        exclude_user: UserId,
    ) -> Result<Vec<UserRating>>;

    /// Create or replace a user's rating for a game type. Keeps the record's
    /// id and creation time when one already exists.
    fn upsert(&self, user_id: UserId, game_type: GameType, rating: f64) -> Result<UserRating>;

    /// Remove a rating record
    fn remove(&self, id: RatingId) -> Result<bool>;

    /// All rating records in insertion order
    fn all(&self) -> Result<Vec<UserRating>>;

    /// Total number of rating records
    fn count(&self) -> Result<usize>;
}

/// In-memory rating storage implementation
#[derive(Debug, Default)]
pub struct InMemoryRatingStore {
    ratings: InMemoryStore<UserRating>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RatingStore for InMemoryRatingStore {
    fn get_by_user_game_type(
        &self,
        user_id: UserId,
        game_type: GameType,
    ) -> Result<Option<UserRating>> {
        self.ratings
            .find_first(|r| r.user_id == user_id && r.game_type == game_type)
    }

    fn find_in_range(
        &self,
        game_type: GameType,
        range: RangeInclusive<f64>,
        exclude_user: UserId,
    ) -> Result<Vec<UserRating>> {
        self.ratings.query(|r| {
            r.game_type == game_type && r.user_id != exclude_user && range.contains(&r.rating)
        })
    }

    fn upsert(&self, user_id: UserId, game_type: GameType, rating: f64) -> Result<UserRating> {
        self.ratings.add_or_update_where(
            |r| r.user_id == user_id && r.game_type == game_type,
            || UserRating::new(user_id, game_type, rating),
            |existing| existing.rating = rating,
        )
    }

    fn remove(&self, id: RatingId) -> Result<bool> {
        self.ratings.delete(id)
    }

    fn all(&self) -> Result<Vec<UserRating>> {
        self.ratings.all()
    }

    fn count(&self) -> Result<usize> {
        self.ratings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_upsert_creates_then_updates() {
        let store = InMemoryRatingStore::new();
        let user = Uuid::new_v4();

        let created = store.upsert(user, GameType::Chess, 1.2).unwrap();
        let updated = store.upsert(user, GameType::Chess, 1.4).unwrap();

        assert_eq!(created.id, updated.id);
        assert_eq!(created.created_at, updated.created_at);
        assert_eq!(updated.rating, 1.4);
        assert_eq!(store.count().unwrap(), 1);

        // Different game type is a separate record
        store.upsert(user, GameType::Go, 0.3).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_get_by_user_game_type() {
        let store = InMemoryRatingStore::new();
        let user = Uuid::new_v4();
        store.upsert(user, GameType::Checkers, 0.7).unwrap();

        let found = store
            .get_by_user_game_type(user, GameType::Checkers)
            .unwrap()
            .unwrap();
        assert_eq!(found.rating, 0.7);

        assert!(store
            .get_by_user_game_type(user, GameType::Chess)
            .unwrap()
            .is_none());
        assert!(store
            .get_by_user_game_type(Uuid::new_v4(), GameType::Checkers)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_find_in_range_is_inclusive_and_excludes_user() {
        let store = InMemoryRatingStore::new();
        let requester = Uuid::new_v4();
        let low = Uuid::new_v4();
        let high = Uuid::new_v4();
        let outside = Uuid::new_v4();

        store.upsert(requester, GameType::Chess, 1.0).unwrap();
        store.upsert(low, GameType::Chess, 0.5).unwrap();
        store.upsert(high, GameType::Chess, 1.5).unwrap();
        store.upsert(outside, GameType::Chess, 1.6).unwrap();
        store.upsert(Uuid::new_v4(), GameType::Go, 1.0).unwrap();

        let found: Vec<UserId> = store
            .find_in_range(GameType::Chess, 0.5..=1.5, requester)
            .unwrap()
            .into_iter()
            .map(|r| r.user_id)
            .collect();

        assert_eq!(found, vec![low, high]);
    }

    #[test]
    fn test_remove_rating() {
        let store = InMemoryRatingStore::new();
        let rating = store.upsert(Uuid::new_v4(), GameType::Chess, 1.0).unwrap();

        assert!(store.remove(rating.id).unwrap());
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.all().unwrap().is_empty());
    }
}
