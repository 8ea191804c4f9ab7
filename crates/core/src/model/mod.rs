mod legacy;
mod preferences;
mod progress;

pub use legacy::{LEGACY_TOPICS, LegacyKey, concept_topic, topic_key};
pub use preferences::{Language, ParseLanguageError, ParseViewModeError, Preferences, ViewMode};
pub use progress::{
    ImportError, MIGRATION_SENTINEL_KEY, PROGRESS_VERSION, ProgressDocument, SENTINEL_VALUE,
    STORAGE_KEY, TopicProgress,
};
