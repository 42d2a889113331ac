//! Demo data seeding
//!
//! Populates an empty deployment with a default setting and a ladder of
//! Chess-rated users so the matchmaker has something to pair against.

use crate::error::Result;
use crate::storage::{RatingStore, SettingsStore};
use crate::types::{GameType, UserId};
use tracing::info;
use uuid::Uuid;

/// Rating step between consecutive demo users
pub const DEMO_RATING_STEP: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct DemoDataSeeder {
    user_count: usize,
    default_max_rating_gap: f64,
    game_type: GameType,
}

/// Users created by a seeding run
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub setting_created: bool,
    pub users: Vec<UserId>,
}

impl DemoDataSeeder {
    pub fn new(user_count: usize, default_max_rating_gap: f64) -> Self {
        Self {
            user_count,
            default_max_rating_gap,
            game_type: GameType::Chess,
        }
    }

    /// Seed ratings for a different game type
    pub fn with_game_type(mut self, game_type: GameType) -> Self {
        self.game_type = game_type;
        self
    }

    /// Store the default setting if missing, then add `user_count` users
    /// rated 0.1, 0.2, ... for the configured game type
    pub fn seed(
        &self,
        ratings: &dyn RatingStore,
        settings: &dyn SettingsStore,
    ) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        if settings.default_setting()?.is_none() {
            settings.update_default_gap(self.default_max_rating_gap)?;
            report.setting_created = true;
        }

        for step in 1..=self.user_count {
            let user_id = Uuid::new_v4();
            ratings.upsert(user_id, self.game_type, step as f64 * DEMO_RATING_STEP)?;
            report.users.push(user_id);
        }

        info!(
            "Seeded {} demo users for {} (default setting {})",
            report.users.len(),
            self.game_type,
            if report.setting_created {
                "created"
            } else {
                "kept"
            }
        );

        Ok(report)
    }
}
