//! Match definition storage
//!
//! A definition is the deduplicated `(game type, match type, gap)` key under
//! which pairs are recorded. Gaps compare with [`gaps_equal`], so two requests
//! whose gaps differ by float noise share one definition.

use super::memory::InMemoryStore;
use crate::error::Result;
use crate::types::{GameType, MatchDefinition, MatchDefinitionId, MatchQuery, MatchType};
use crate::utils::gaps_equal;

/// Result of [`MatchDefinitionStore::add_ignore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionInsert {
    /// The definition was new and has been stored
    Inserted(MatchDefinitionId),
    /// An equivalent definition already existed
    Existing(MatchDefinitionId),
}

impl DefinitionInsert {
    pub fn id(&self) -> MatchDefinitionId {
        match self {
            DefinitionInsert::Inserted(id) | DefinitionInsert::Existing(id) => *id,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, DefinitionInsert::Inserted(_))
    }
}

/// Trait for match definition storage operations
pub trait MatchDefinitionStore: Send + Sync {
    /// Store `definition` unless an equivalent one exists, returning whichever
    /// record is authoritative
    fn add_ignore(&self, definition: MatchDefinition) -> Result<DefinitionInsert>;

    fn get(&self, id: MatchDefinitionId) -> Result<Option<MatchDefinition>>;

    /// Replace a stored definition
    fn update(&self, definition: MatchDefinition) -> Result<MatchDefinition>;

    /// Definitions matching the query filters, newest first. Paging fields are
    /// ignored here; they apply to pair rows.
    fn query_newest_first(&self, query: &MatchQuery) -> Result<Vec<MatchDefinition>>;

    fn all(&self) -> Result<Vec<MatchDefinition>>;

    fn count(&self) -> Result<usize>;
}

/// Whether two definitions share the same deduplication key
pub fn same_key(
    definition: &MatchDefinition,
    game_type: GameType,
    match_type: MatchType,
    max_rating_gap: f64,
) -> bool {
    definition.game_type == game_type
        && definition.match_type == match_type
        && gaps_equal(definition.max_rating_gap, max_rating_gap)
}

fn matches_query(definition: &MatchDefinition, query: &MatchQuery) -> bool {
    query.game_type.map_or(true, |g| definition.game_type == g)
        && query.match_type.map_or(true, |m| definition.match_type == m)
        && query
            .max_rating_gap
            .map_or(true, |ceiling| definition.max_rating_gap <= ceiling)
}

/// In-memory match definition storage
#[derive(Debug, Default)]
pub struct InMemoryMatchDefinitionStore {
    definitions: InMemoryStore<MatchDefinition>,
}

impl InMemoryMatchDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchDefinitionStore for InMemoryMatchDefinitionStore {
    fn add_ignore(&self, definition: MatchDefinition) -> Result<DefinitionInsert> {
        let (game_type, match_type, gap) = (
            definition.game_type,
            definition.match_type,
            definition.max_rating_gap,
        );

        let (id, inserted) = self
            .definitions
            .find_or_add(|d| same_key(d, game_type, match_type, gap), definition)?;

        Ok(if inserted {
            DefinitionInsert::Inserted(id)
        } else {
            DefinitionInsert::Existing(id)
        })
    }

    fn get(&self, id: MatchDefinitionId) -> Result<Option<MatchDefinition>> {
        self.definitions.get(id)
    }

    fn update(&self, definition: MatchDefinition) -> Result<MatchDefinition> {
        self.definitions.update(definition)
    }

    fn query_newest_first(&self, query: &MatchQuery) -> Result<Vec<MatchDefinition>> {
        self.definitions
            .query_newest_first(|d| matches_query(d, query))
    }

    fn all(&self) -> Result<Vec<MatchDefinition>> {
        self.definitions.all()
    }

    fn count(&self) -> Result<usize> {
        self.definitions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_ignore_deduplicates_within_tolerance() {
        let store = InMemoryMatchDefinitionStore::new();

        let first = store
            .add_ignore(MatchDefinition::new(GameType::Chess, MatchType::Any, 0.5))
            .unwrap();
        let near = store
            .add_ignore(MatchDefinition::new(
                GameType::Chess,
                MatchType::Any,
                0.5000000001,
            ))
            .unwrap();
        let distinct = store
            .add_ignore(MatchDefinition::new(GameType::Chess, MatchType::Any, 0.6))
            .unwrap();

        assert!(first.was_inserted());
        assert_eq!(near, DefinitionInsert::Existing(first.id()));
        assert!(distinct.was_inserted());
        assert_ne!(distinct.id(), first.id());
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_add_ignore_keys_on_game_and_match_type() {
        let store = InMemoryMatchDefinitionStore::new();

        store
            .add_ignore(MatchDefinition::new(GameType::Chess, MatchType::Any, 0.5))
            .unwrap();
        let other_type = store
            .add_ignore(MatchDefinition::new(
                GameType::Chess,
                MatchType::EasierOnly,
                0.5,
            ))
            .unwrap();
        let other_game = store
            .add_ignore(MatchDefinition::new(GameType::Go, MatchType::Any, 0.5))
            .unwrap();

        assert!(other_type.was_inserted());
        assert!(other_game.was_inserted());
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_query_filters_and_orders_newest_first() {
        let store = InMemoryMatchDefinitionStore::new();
        let small = store
            .add_ignore(MatchDefinition::new(GameType::Chess, MatchType::Any, 0.2))
            .unwrap()
            .id();
        let large = store
            .add_ignore(MatchDefinition::new(GameType::Chess, MatchType::Any, 0.8))
            .unwrap()
            .id();
        let go = store
            .add_ignore(MatchDefinition::new(GameType::Go, MatchType::Any, 0.2))
            .unwrap()
            .id();

        let everything: Vec<_> = store
            .query_newest_first(&MatchQuery::default())
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(everything, vec![go, large, small]);

        let chess_small: Vec<_> = store
            .query_newest_first(&MatchQuery {
                game_type: Some(GameType::Chess),
                max_rating_gap: Some(0.2),
                ..MatchQuery::default()
            })
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(chess_small, vec![small]);
    }

    #[test]
    fn test_update_definition() {
        let store = InMemoryMatchDefinitionStore::new();
        let id = store
            .add_ignore(MatchDefinition::new(GameType::Chess, MatchType::Any, 0.2))
            .unwrap()
            .id();

        let mut definition = store.get(id).unwrap().unwrap();
        definition.match_type = MatchType::HarderOnly;
        store.update(definition).unwrap();

        assert_eq!(
            store.get(id).unwrap().unwrap().match_type,
            MatchType::HarderOnly
        );
    }
}
