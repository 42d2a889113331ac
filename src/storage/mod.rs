//! Record storage for ratings, settings, match definitions and match pairs

pub mod definitions;
pub mod memory;
pub mod pairs;
pub mod ratings;
pub mod settings;

pub use definitions::{DefinitionInsert, InMemoryMatchDefinitionStore, MatchDefinitionStore};
pub use memory::{InMemoryStore, Record};
pub use pairs::{InMemoryMatchPairStore, MatchPairStore, MatchResponses, DEFAULT_PAGE_SIZE};
pub use ratings::{InMemoryRatingStore, RatingStore};
pub use settings::{InMemorySettingsStore, SettingsStore};
