//! Test fixtures and scripted matchmakers for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use game_match::dispatch::{DispatchConfig, DispatchProcessor};
use game_match::error::Result;
use game_match::matchmaker::{MatchMaker, MatchOutcome, OneToOneMatchMaker};
use game_match::queue::{InMemoryMatchQueue, MatchQueue};
use game_match::storage::{
    InMemoryMatchDefinitionStore, InMemoryMatchPairStore, InMemoryRatingStore,
    InMemorySettingsStore, MatchDefinitionStore, MatchPairStore, RatingStore, SettingsStore,
};
use game_match::types::{GameType, MatchRequest, MatchType, UserId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Complete in-process system: stores, queue, real matchmaker and dispatch
/// processor wired together the way the service wires them
pub struct TestSystem {
    pub ratings: Arc<dyn RatingStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub definitions: Arc<dyn MatchDefinitionStore>,
    pub pairs: Arc<dyn MatchPairStore>,
    pub queue: Arc<InMemoryMatchQueue>,
    pub processor: DispatchProcessor,
}

impl TestSystem {
    /// Build a started system with the given default gap
    pub fn new(default_gap: f64) -> Self {
        let ratings: Arc<dyn RatingStore> = Arc::new(InMemoryRatingStore::new());
        let settings: Arc<dyn SettingsStore> = Arc::new(
            InMemorySettingsStore::with_default_gap(default_gap)
                .expect("Failed to store default setting"),
        );
        let definitions: Arc<dyn MatchDefinitionStore> =
            Arc::new(InMemoryMatchDefinitionStore::new());
        let pairs: Arc<dyn MatchPairStore> =
            Arc::new(InMemoryMatchPairStore::new(definitions.clone()));

        let matchmaker = Arc::new(OneToOneMatchMaker::new(
            ratings.clone(),
            settings.clone(),
            definitions.clone(),
            pairs.clone(),
        ));

        let queue = Arc::new(InMemoryMatchQueue::new());
        let processor = DispatchProcessor::new(queue.clone(), matchmaker, short_final_wait())
            .expect("Failed to create processor");
        processor.start().expect("Failed to start processor");

        Self {
            ratings,
            settings,
            definitions,
            pairs,
            queue,
            processor,
        }
    }

    /// Store a rating and return the user's id
    pub fn rated_user(&self, game_type: GameType, rating: f64) -> UserId {
        let user_id = Uuid::new_v4();
        self.ratings
            .upsert(user_id, game_type, rating)
            .expect("Failed to store rating");
        user_id
    }

    pub fn enqueue(&self, user_id: UserId, game_type: GameType, match_type: MatchType) {
        self.queue
            .enqueue(MatchRequest::new(user_id, game_type, match_type))
            .expect("Failed to enqueue request");
    }

    /// Wait until the queue is drained and every worker has exited
    pub async fn settle(&self) {
        assert!(
            self.processor.wait_until_idle(Duration::from_secs(10)).await,
            "dispatch pool did not go idle"
        );
    }
}

/// Keep test shutdowns fast
pub fn short_final_wait() -> DispatchConfig {
    DispatchConfig {
        final_wait: Duration::from_millis(500),
    }
}

/// Build a started processor around any matchmaker
pub fn processor_with(
    matchmaker: Arc<dyn MatchMaker>,
) -> (Arc<InMemoryMatchQueue>, DispatchProcessor) {
    let queue = Arc::new(InMemoryMatchQueue::new());
    let processor = DispatchProcessor::new(queue.clone(), matchmaker, short_final_wait())
        .expect("Failed to create processor");
    processor.start().expect("Failed to start processor");
    (queue, processor)
}

pub fn request_for(user_id: UserId) -> MatchRequest {
    MatchRequest::new(user_id, GameType::Chess, MatchType::Any)
}

/// Matchmaker that sleeps before recording each request
pub struct SlowMatchMaker {
    delay: Duration,
    seen: Mutex<Vec<UserId>>,
}

impl SlowMatchMaker {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<UserId> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MatchMaker for SlowMatchMaker {
    async fn make_match(&self, request: &MatchRequest) -> Result<MatchOutcome> {
        tokio::time::sleep(self.delay).await;
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.requesting_user_id);
        }
        Ok(MatchOutcome::Matched {
            match_definition_id: Uuid::new_v4(),
            definition_created: true,
            pairs_created: 0,
        })
    }
}

/// Matchmaker that panics for selected users and counts everyone else
pub struct PanickingMatchMaker {
    panic_for: HashSet<UserId>,
    processed: AtomicUsize,
}

impl PanickingMatchMaker {
    pub fn new(panic_for: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            panic_for: panic_for.into_iter().collect(),
            processed: AtomicUsize::new(0),
        }
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MatchMaker for PanickingMatchMaker {
    async fn make_match(&self, request: &MatchRequest) -> Result<MatchOutcome> {
        if self.panic_for.contains(&request.requesting_user_id) {
            panic!("scripted failure for {}", request.requesting_user_id);
        }
        self.processed.fetch_add(1, Ordering::SeqCst);
        Ok(MatchOutcome::Unrated)
    }
}
