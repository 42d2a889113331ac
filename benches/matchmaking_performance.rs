//! Performance benchmarks for rating bands, matchmaking and reporting

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use game_match::matchmaker::{rating_band, MatchMaker, OneToOneMatchMaker};
use game_match::storage::{
    InMemoryMatchDefinitionStore, InMemoryMatchPairStore, InMemoryRatingStore,
    InMemorySettingsStore, MatchDefinitionStore, MatchPairStore, RatingStore, SettingsStore,
};
use game_match::types::{GameType, MatchQuery, MatchRequest, MatchType, UserId};
use std::sync::Arc;
use uuid::Uuid;

struct BenchSystem {
    matchmaker: OneToOneMatchMaker,
    pairs: Arc<dyn MatchPairStore>,
    users: Vec<UserId>,
}

/// Build stores holding `user_count` Chess ratings spread over [0, 10)
fn create_bench_system(user_count: usize, gap: f64) -> BenchSystem {
    let ratings: Arc<dyn RatingStore> = Arc::new(InMemoryRatingStore::new());
    let settings: Arc<dyn SettingsStore> =
        Arc::new(InMemorySettingsStore::with_default_gap(gap).unwrap());
    let definitions: Arc<dyn MatchDefinitionStore> = Arc::new(InMemoryMatchDefinitionStore::new());
    let pairs: Arc<dyn MatchPairStore> = Arc::new(InMemoryMatchPairStore::new(definitions.clone()));

    let users: Vec<UserId> = (0..user_count)
        .map(|i| {
            let user_id = Uuid::new_v4();
            ratings
                .upsert(user_id, GameType::Chess, (i % 1000) as f64 / 100.0)
                .unwrap();
            user_id
        })
        .collect();

    BenchSystem {
        matchmaker: OneToOneMatchMaker::new(ratings, settings, definitions, pairs.clone()),
        pairs,
        users,
    }
}

fn bench_rating_band(c: &mut Criterion) {
    c.bench_function("rating_band_all_match_types", |b| {
        b.iter(|| {
            for match_type in [MatchType::Any, MatchType::EasierOnly, MatchType::HarderOnly] {
                black_box(rating_band(black_box(4.2), black_box(0.35), match_type));
            }
        })
    });
}

fn bench_make_match(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let system = create_bench_system(1000, 0.05);
    let mut next = 0usize;

    c.bench_function("make_match_1000_ratings", |b| {
        b.iter(|| {
            let user = system.users[next % system.users.len()];
            next += 1;
            let request = MatchRequest::new(user, GameType::Chess, MatchType::Any);
            rt.block_on(async { black_box(system.matchmaker.make_match(&request).await) })
        })
    });
}

fn bench_match_report(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let system = create_bench_system(500, 0.1);

    // Populate a few definitions worth of pairs
    rt.block_on(async {
        for (i, user) in system.users.iter().take(100).enumerate() {
            let match_type = match i % 3 {
                0 => MatchType::Any,
                1 => MatchType::EasierOnly,
                _ => MatchType::HarderOnly,
            };
            let request = MatchRequest::new(*user, GameType::Chess, match_type);
            system.matchmaker.make_match(&request).await.unwrap();
        }
    });

    let query = MatchQuery {
        skip: 50,
        take: 100,
        ..MatchQuery::default()
    };

    c.bench_function("match_report_page", |b| {
        b.iter(|| {
            let page: Vec<_> = system
                .pairs
                .query_by_request(None, black_box(&query))
                .unwrap()
                .collect();
            black_box(page)
        })
    });
}

criterion_group!(
    benches,
    bench_rating_band,
    bench_make_match,
    bench_match_report
);
criterion_main!(benches);
