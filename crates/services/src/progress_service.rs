use std::sync::Arc;

use microleet_core::Clock;
use microleet_core::model::{
    Language, ProgressDocument, STORAGE_KEY, TopicProgress, ViewMode,
};
use storage::repository::KeyValueStore;

use crate::error::ProgressServiceError;

/// Points awarded per completed exercise when the caller has no opinion.
pub const DEFAULT_POINTS_AWARD: u32 = 5;

/// Partial update for user preferences; `None` fields are left unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreferencesUpdate {
    pub dark_mode: Option<bool>,
    pub view_mode: Option<ViewMode>,
    pub language: Option<Language>,
}

/// Read/write/export/import surface over the persisted progress document.
///
/// All mutators follow read-modify-write through the store; the store is
/// assumed single-writer (a concurrent writer from another process is the
/// same accepted risk as the original's multi-tab scenario).
#[derive(Clone)]
pub struct ProgressService {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl ProgressService {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Load the current document, or defaults when none has been written yet.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure or if the stored
    /// document no longer parses.
    pub async fn load(&self) -> Result<ProgressDocument, ProgressServiceError> {
        match self.store.get(STORAGE_KEY).await? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(ProgressServiceError::Corrupted)
            }
            None => Ok(ProgressDocument::default()),
        }
    }

    /// Persist the document under the canonical key.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn save(&self, doc: &ProgressDocument) -> Result<(), ProgressServiceError> {
        let text = doc.to_json().map_err(ProgressServiceError::Serialize)?;
        self.store.set(STORAGE_KEY, &text).await?;
        Ok(())
    }

    /// Award points to a topic, creating its record on first touch.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn add_points(
        &self,
        topic: &str,
        points: u32,
    ) -> Result<ProgressDocument, ProgressServiceError> {
        let mut doc = self.load().await?;
        let entry = doc.topic_entry(topic);
        entry.points = entry.points.saturating_add(points);
        entry.last_accessed = Some(self.clock.now());
        self.save(&doc).await?;
        Ok(doc)
    }

    /// Mark a concept complete. Already-complete concepts are not duplicated.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn complete_concept(
        &self,
        topic: &str,
        concept_id: &str,
    ) -> Result<ProgressDocument, ProgressServiceError> {
        let mut doc = self.load().await?;
        let entry = doc.topic_entry(topic);
        if !entry.completed_concepts.iter().any(|id| id == concept_id) {
            entry.completed_concepts.push(concept_id.to_owned());
            entry.last_accessed = Some(self.clock.now());
            self.save(&doc).await?;
        }
        Ok(doc)
    }

    /// Unmark a completed concept, removing every occurrence of its id.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn uncomplete_concept(
        &self,
        topic: &str,
        concept_id: &str,
    ) -> Result<ProgressDocument, ProgressServiceError> {
        let mut doc = self.load().await?;
        let entry = doc.topic_entry(topic);
        entry.completed_concepts.retain(|id| id != concept_id);
        entry.last_accessed = Some(self.clock.now());
        self.save(&doc).await?;
        Ok(doc)
    }

    /// Whether a concept has been completed for a topic.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn is_concept_complete(
        &self,
        topic: &str,
        concept_id: &str,
    ) -> Result<bool, ProgressServiceError> {
        let doc = self.load().await?;
        Ok(doc
            .topic(topic)
            .is_some_and(|entry| entry.completed_concepts.iter().any(|id| id == concept_id)))
    }

    /// Progress for a topic, or an empty record when none exists.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn topic_progress(&self, topic: &str) -> Result<TopicProgress, ProgressServiceError> {
        let doc = self.load().await?;
        Ok(doc.topic(topic).cloned().unwrap_or_default())
    }

    /// Record an understanding rating for a problem, clamped to the 1-5 scale.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn set_problem_understanding(
        &self,
        problem_id: &str,
        level: u8,
    ) -> Result<ProgressDocument, ProgressServiceError> {
        let mut doc = self.load().await?;
        doc.problem_understanding
            .insert(problem_id.to_owned(), level.clamp(1, 5));
        self.save(&doc).await?;
        Ok(doc)
    }

    /// Understanding rating for a problem; 0 means unrated.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn problem_understanding(
        &self,
        problem_id: &str,
    ) -> Result<u8, ProgressServiceError> {
        let doc = self.load().await?;
        Ok(doc.problem_understanding.get(problem_id).copied().unwrap_or(0))
    }

    /// Apply a partial preferences update.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn update_preferences(
        &self,
        update: PreferencesUpdate,
    ) -> Result<ProgressDocument, ProgressServiceError> {
        let mut doc = self.load().await?;
        if let Some(dark_mode) = update.dark_mode {
            doc.preferences.dark_mode = Some(dark_mode);
        }
        if let Some(view_mode) = update.view_mode {
            doc.preferences.view_mode = view_mode;
        }
        if let Some(language) = update.language {
            doc.preferences.language = language;
        }
        self.save(&doc).await?;
        Ok(doc)
    }

    /// Replace the document with defaults.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn reset(&self) -> Result<ProgressDocument, ProgressServiceError> {
        let doc = ProgressDocument::default();
        self.save(&doc).await?;
        Ok(doc)
    }

    /// Serialize the current document for backup download. No storage side
    /// effects.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn export(&self) -> Result<String, ProgressServiceError> {
        let doc = self.load().await?;
        doc.to_json().map_err(ProgressServiceError::Serialize)
    }

    /// Suggested filename for an exported backup,
    /// `microleet-progress-<ISO-date>.json`.
    #[must_use]
    pub fn export_file_name(&self) -> String {
        format!(
            "microleet-progress-{}.json",
            self.clock.now().format("%Y-%m-%d")
        )
    }

    /// Replace the stored document wholesale with an imported backup.
    ///
    /// Validation happens before any write, so a rejected backup leaves
    /// storage completely untouched. There is no partial or merge import.
    /// Callers holding an in-memory copy of the document must reload it
    /// after a successful import.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Import` if the text is not a progress
    /// document, or a storage error if the write fails.
    pub async fn import(&self, text: &str) -> Result<ProgressDocument, ProgressServiceError> {
        let doc = ProgressDocument::from_json(text)?;
        self.save(&doc).await?;
        Ok(doc)
    }
}
