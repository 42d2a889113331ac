//! Process-wide matchmaking settings

use super::memory::InMemoryStore;
use crate::error::Result;
use crate::types::DefaultSetting;

/// Access to the stored default setting
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore: Send + Sync {
    /// The default setting, if one has been stored
    fn default_setting(&self) -> Result<Option<DefaultSetting>>;

    /// Change the default rating gap, creating the setting when missing
    fn update_default_gap(&self, default_max_rating_gap: f64) -> Result<DefaultSetting>;
}

/// In-memory settings storage. Only the first stored record is authoritative.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    settings: InMemoryStore<DefaultSetting>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store created with an initial default gap
    pub fn with_default_gap(default_max_rating_gap: f64) -> Result<Self> {
        let store = Self::new();
        store.update_default_gap(default_max_rating_gap)?;
        Ok(store)
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn default_setting(&self) -> Result<Option<DefaultSetting>> {
        self.settings.find_first(|_| true)
    }

    fn update_default_gap(&self, default_max_rating_gap: f64) -> Result<DefaultSetting> {
        self.settings.add_or_update_where(
            |_| true,
            || DefaultSetting::new(default_max_rating_gap),
            |setting| setting.default_max_rating_gap = default_max_rating_gap,
        )
    }
}
