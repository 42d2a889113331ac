//! Match pair storage and paged reporting
//!
//! Pairs are append-only. Reporting walks definitions newest first and yields
//! one [`MatchResponse`] per definition that still has rows after paging.

use super::definitions::MatchDefinitionStore;
use super::memory::InMemoryStore;
use crate::error::Result;
use crate::types::{
    MatchDefinition, MatchDefinitionId, MatchPair, MatchPairId, MatchPairResponse, MatchQuery,
    MatchResponse, UserId,
};
use std::sync::Arc;

/// Page size used when a query asks for zero or fewer rows
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Lazily evaluated report. Each call to `query_by_request` starts a fresh one.
pub type MatchResponses<'a> = Box<dyn Iterator<Item = Result<MatchResponse>> + Send + 'a>;

/// Trait for match pair storage operations
pub trait MatchPairStore: Send + Sync {
    fn add(&self, pair: MatchPair) -> Result<MatchPairId>;

    /// Pairs recorded under a definition, in insertion order
    fn by_definition(&self, definition_id: MatchDefinitionId) -> Result<Vec<MatchPair>>;

    /// Pairs where the user appears on either side, in insertion order
    fn by_participant(&self, user_id: UserId) -> Result<Vec<MatchPair>>;

    fn count(&self) -> Result<usize>;

    /// Paged report of pairs grouped by definition.
    ///
    /// `skip` and `take` count pair rows across all definitions. When
    /// `user_id` is set only pairs requested by that user are reported.
    fn query_by_request<'a>(
        &'a self,
        user_id: Option<UserId>,
        query: &MatchQuery,
    ) -> Result<MatchResponses<'a>>;
}

/// In-memory match pair storage. Reads definitions through the shared
/// definition store.
pub struct InMemoryMatchPairStore {
    pairs: InMemoryStore<MatchPair>,
    definitions: Arc<dyn MatchDefinitionStore>,
}

impl InMemoryMatchPairStore {
    pub fn new(definitions: Arc<dyn MatchDefinitionStore>) -> Self {
        Self {
            pairs: InMemoryStore::new(),
            definitions,
        }
    }
}

impl std::fmt::Debug for InMemoryMatchPairStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMatchPairStore")
            .field("pairs", &self.pairs)
            .finish_non_exhaustive()
    }
}

impl MatchPairStore for InMemoryMatchPairStore {
    fn add(&self, pair: MatchPair) -> Result<MatchPairId> {
        self.pairs.add(pair)
    }

    fn by_definition(&self, definition_id: MatchDefinitionId) -> Result<Vec<MatchPair>> {
        self.pairs
            .query(|p| p.match_definition_id == definition_id)
    }

    fn by_participant(&self, user_id: UserId) -> Result<Vec<MatchPair>> {
        self.pairs.query(|p| p.involves(user_id))
    }

    fn count(&self) -> Result<usize> {
        self.pairs.len()
    }

    fn query_by_request<'a>(
        &'a self,
        user_id: Option<UserId>,
        query: &MatchQuery,
    ) -> Result<MatchResponses<'a>> {
        let definitions = self.definitions.query_newest_first(query)?;

        Ok(Box::new(PagedResponses {
            pairs: &self.pairs,
            definitions: definitions.into_iter(),
            user_id,
            skip: query.skip.max(0) as usize,
            take: page_size(query.take),
            seen: 0,
            emitted: 0,
            finished: false,
        }))
    }
}

fn page_size(take: i64) -> usize {
    if take <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        take as usize
    }
}

struct PagedResponses<'a> {
    pairs: &'a InMemoryStore<MatchPair>,
    definitions: std::vec::IntoIter<MatchDefinition>,
    user_id: Option<UserId>,
    skip: usize,
    take: usize,
    /// Pair rows enumerated so far, skipped ones included
    seen: usize,
    emitted: usize,
    finished: bool,
}

impl Iterator for PagedResponses<'_> {
    type Item = Result<MatchResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished && self.emitted < self.take {
            let definition = self.definitions.next()?;
            let user_id = self.user_id;

            let pairs = match self.pairs.query_newest_first(|p| {
                p.match_definition_id == definition.id
                    && user_id.map_or(true, |u| p.requesting_user_id == u)
            }) {
                Ok(pairs) => pairs,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            let mut matches = Vec::new();
            for pair in &pairs {
                if self.emitted >= self.take {
                    break;
                }
                self.seen += 1;
                if self.seen <= self.skip {
                    continue;
                }
                matches.push(MatchPairResponse::from(pair));
                self.emitted += 1;
            }

            if !matches.is_empty() {
                return Some(Ok(MatchResponse {
                    game_type: definition.game_type,
                    match_type: definition.match_type,
                    max_rating_gap: definition.max_rating_gap,
                    matches,
                }));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::definitions::InMemoryMatchDefinitionStore;
    use crate::types::{GameType, MatchType, UserRating};
    use uuid::Uuid;

    struct Fixture {
        definitions: Arc<InMemoryMatchDefinitionStore>,
        pairs: InMemoryMatchPairStore,
    }

    fn fixture() -> Fixture {
        let definitions = Arc::new(InMemoryMatchDefinitionStore::new());
        let pairs = InMemoryMatchPairStore::new(definitions.clone());
        Fixture { definitions, pairs }
    }

    fn define(fixture: &Fixture, gap: f64) -> MatchDefinitionId {
        fixture
            .definitions
            .add_ignore(MatchDefinition::new(GameType::Chess, MatchType::Any, gap))
            .unwrap()
            .id()
    }

    /// Add `n` pairs and return the matched users in insertion order
    fn add_pairs(
        fixture: &Fixture,
        definition: MatchDefinitionId,
        requester: UserId,
        n: usize,
    ) -> Vec<UserId> {
        let requester = UserRating::new(requester, GameType::Chess, 1.0);
        (0..n)
            .map(|i| {
                let candidate =
                    UserRating::new(Uuid::new_v4(), GameType::Chess, 1.0 + i as f64 / 10.0);
                fixture
                    .pairs
                    .add(MatchPair::new(definition, &requester, &candidate))
                    .unwrap();
                candidate.user_id
            })
            .collect()
    }

    fn matched_ids(responses: &[MatchResponse]) -> Vec<UserId> {
        responses
            .iter()
            .flat_map(|r| r.matches.iter().map(|m| m.matched_user_id))
            .collect()
    }

    fn page(fixture: &Fixture, skip: i64, take: i64) -> Vec<MatchResponse> {
        collect(
            fixture,
            None,
            MatchQuery {
                skip,
                take,
                ..MatchQuery::default()
            },
        )
    }

    fn collect(fixture: &Fixture, user: Option<UserId>, query: MatchQuery) -> Vec<MatchResponse> {
        fixture
            .pairs
            .query_by_request(user, &query)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_skip_and_take_count_rows_across_definitions() {
        let fixture = fixture();
        let requester = Uuid::new_v4();
        let oldest = define(&fixture, 0.1);
        let middle = define(&fixture, 0.2);
        let newest = define(&fixture, 0.3);

        // Newest first walks 1, 3 and 2 pairs
        let oldest_rows = add_pairs(&fixture, oldest, requester, 2);
        let middle_rows = add_pairs(&fixture, middle, requester, 3);
        let newest_rows = add_pairs(&fixture, newest, requester, 1);

        // Equal timestamps fall back to insertion order, newest first
        let global: Vec<UserId> = newest_rows
            .iter()
            .rev()
            .chain(middle_rows.iter().rev())
            .chain(oldest_rows.iter().rev())
            .copied()
            .collect();
        assert_eq!(matched_ids(&page(&fixture, 0, 100)), global);

        // Rows 3 and 4 both come from the middle definition
        let responses = page(&fixture, 2, 2);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].max_rating_gap, 0.2);
        assert_eq!(matched_ids(&responses), global[2..4].to_vec());
        assert_eq!(matched_ids(&responses), vec![middle_rows[1], middle_rows[0]]);

        // Rows 4 and 5 span the middle and oldest definitions
        let responses = page(&fixture, 3, 2);
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].max_rating_gap, 0.2);
        assert_eq!(responses[1].max_rating_gap, 0.1);
        assert_eq!(responses[0].matches.len(), 1);
        assert_eq!(responses[1].matches.len(), 1);
        assert_eq!(matched_ids(&responses), vec![middle_rows[0], oldest_rows[1]]);

        // The first page stops inside the middle definition
        let responses = page(&fixture, 0, 3);
        assert_eq!(responses.len(), 2);
        assert_eq!(matched_ids(&responses), global[..3].to_vec());

        // Skipping past the end yields nothing
        assert!(page(&fixture, 6, 5).is_empty());
    }

    #[test]
    fn test_non_positive_take_uses_default_page() {
        let fixture = fixture();
        let d1 = define(&fixture, 0.1);
        add_pairs(&fixture, d1, Uuid::new_v4(), 120);

        let responses = collect(
            &fixture,
            None,
            MatchQuery {
                take: 0,
                skip: -5,
                ..MatchQuery::default()
            },
        );

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].matches.len(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_user_filter_limits_to_requester() {
        let fixture = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let d1 = define(&fixture, 0.1);
        let d2 = define(&fixture, 0.2);
        add_pairs(&fixture, d1, alice, 2);
        add_pairs(&fixture, d2, bob, 3);

        let responses = collect(&fixture, Some(alice), MatchQuery::default());

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].max_rating_gap, 0.1);
        assert!(responses[0]
            .matches
            .iter()
            .all(|m| m.requesting_user_id == alice));

        let everyone = collect(&fixture, None, MatchQuery::default());
        assert_eq!(everyone.len(), 2);
    }

    #[test]
    fn test_gap_ceiling_and_empty_definitions_omitted() {
        let fixture = fixture();
        let requester = Uuid::new_v4();
        let small = define(&fixture, 0.1);
        define(&fixture, 0.15);
        let large = define(&fixture, 0.9);
        add_pairs(&fixture, small, requester, 1);
        add_pairs(&fixture, large, requester, 1);

        let responses = collect(
            &fixture,
            None,
            MatchQuery {
                max_rating_gap: Some(0.5),
                ..MatchQuery::default()
            },
        );

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].max_rating_gap, 0.1);
    }

    #[test]
    fn test_report_is_restartable() {
        let fixture = fixture();
        let d1 = define(&fixture, 0.1);
        add_pairs(&fixture, d1, Uuid::new_v4(), 3);

        let first = collect(&fixture, None, MatchQuery::default());
        let second = collect(&fixture, None, MatchQuery::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_lookup_by_definition_and_participant() {
        let fixture = fixture();
        let requester = Uuid::new_v4();
        let d1 = define(&fixture, 0.1);
        let d2 = define(&fixture, 0.2);
        add_pairs(&fixture, d1, requester, 2);
        add_pairs(&fixture, d2, Uuid::new_v4(), 1);

        assert_eq!(fixture.pairs.by_definition(d1).unwrap().len(), 2);
        assert_eq!(fixture.pairs.by_definition(d2).unwrap().len(), 1);
        assert_eq!(fixture.pairs.by_participant(requester).unwrap().len(), 2);
        assert_eq!(fixture.pairs.count().unwrap(), 3);
    }
}
