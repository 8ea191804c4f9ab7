//! One-time migration of fragmented legacy storage entries into the
//! canonical progress document.

use std::collections::BTreeMap;
use std::sync::Arc;

use microleet_core::model::{
    LEGACY_TOPICS, LegacyKey, MIGRATION_SENTINEL_KEY, ProgressDocument, SENTINEL_VALUE,
    STORAGE_KEY, ViewMode, concept_topic, topic_key,
};
use storage::repository::KeyValueStore;

use crate::error::MigrationError;

/// Result of one migration scan.
#[derive(Clone, Debug, PartialEq)]
pub enum MigrationOutcome {
    /// Legacy entries were found and rewritten into the canonical document.
    Migrated(ProgressDocument),
    /// The canonical document already exists; nothing was touched.
    AlreadyMigrated,
    /// No legacy entries were present; nothing was written.
    NothingToMigrate,
}

/// Transform legacy storage entries into one canonical progress document and
/// remove the entries it consumed.
///
/// Each legacy key is handled independently: a malformed value for one key is
/// logged and skipped without aborting the others, and malformed keys are
/// left in place rather than deleted. The assembled document is only
/// persisted if at least one key actually migrated.
///
/// # Errors
///
/// Returns `MigrationError` if the backing store itself fails; parse
/// failures of individual values are not errors.
pub async fn migrate_legacy(
    store: &dyn KeyValueStore,
) -> Result<MigrationOutcome, MigrationError> {
    // The canonical document always wins, even over a missing sentinel.
    if store.get(STORAGE_KEY).await?.is_some() {
        tracing::info!("migration skipped: progress document already exists");
        return Ok(MigrationOutcome::AlreadyMigrated);
    }

    let mut doc = ProgressDocument::default();
    let mut migrated = false;

    // Per-topic points, e.g. "stackPoints" = "5".
    for topic in LEGACY_TOPICS {
        let key = LegacyKey::TopicPoints(topic).key();
        let Some(raw) = store.get(&key).await? else {
            continue;
        };
        let points = raw.trim().parse::<u32>().unwrap_or(0);
        doc.topic_entry(&topic_key(topic)).points = points;
        store.remove(&key).await?;
        migrated = true;
        tracing::info!(key = %key, points, "migrated legacy topic points");
    }

    // Combined completed-concepts list, partitioned by topic prefix.
    // Duplicates in the legacy array are preserved as-is.
    let concepts_key = LegacyKey::CompletedConcepts.key();
    if let Some(raw) = store.get(&concepts_key).await? {
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(concept_ids) => {
                let count = concept_ids.len();
                for concept_id in concept_ids {
                    let Some(topic) = concept_topic(&concept_id).map(str::to_owned) else {
                        continue;
                    };
                    doc.topic_entry(&topic).completed_concepts.push(concept_id);
                }
                store.remove(&concepts_key).await?;
                migrated = true;
                tracing::info!(count, "migrated completed concepts");
            }
            Err(err) => {
                tracing::warn!(%err, "legacy completed concepts are malformed, skipping");
            }
        }
    }

    // Problem-understanding ratings, assigned wholesale.
    let understanding_key = LegacyKey::ProblemUnderstanding.key();
    if let Some(raw) = store.get(&understanding_key).await? {
        match serde_json::from_str::<BTreeMap<String, u8>>(&raw) {
            Ok(ratings) => {
                doc.problem_understanding = ratings;
                store.remove(&understanding_key).await?;
                migrated = true;
                tracing::info!("migrated problem understanding");
            }
            Err(err) => {
                tracing::warn!(%err, "legacy problem understanding is malformed, skipping");
            }
        }
    }

    // Standalone preference keys.
    let dark_mode_key = LegacyKey::DarkMode.key();
    if let Some(raw) = store.get(&dark_mode_key).await? {
        doc.preferences.dark_mode = Some(raw == "true");
        store.remove(&dark_mode_key).await?;
        migrated = true;
    }

    let view_mode_key = LegacyKey::ViewMode.key();
    if let Some(raw) = store.get(&view_mode_key).await? {
        if let Ok(view_mode) = raw.parse::<ViewMode>() {
            doc.preferences.view_mode = view_mode;
            store.remove(&view_mode_key).await?;
            migrated = true;
        } else {
            tracing::warn!(raw = %raw, "legacy view mode is not a known value, skipping");
        }
    }

    if migrated {
        let text = doc.to_json()?;
        store.set(STORAGE_KEY, &text).await?;
        tracing::info!("legacy migration completed");
        Ok(MigrationOutcome::Migrated(doc))
    } else {
        tracing::info!("no legacy data found to migrate");
        Ok(MigrationOutcome::NothingToMigrate)
    }
}

/// Externally visible state of the one-time migration gate.
#[derive(Clone, Debug, Default)]
pub struct MigrationState {
    /// Whether the gate has completed within this process.
    pub has_run: bool,
    /// How many times the underlying scan actually executed.
    pub attempts: u32,
    /// Outcome of the scan, when one ran and succeeded.
    pub outcome: Option<MigrationOutcome>,
}

/// Ensures the legacy migration runs at most once per storage origin.
///
/// Invoked at application startup, before anything reads the progress
/// document. Failures inside the scan are logged and swallowed: startup must
/// never crash on a migration problem, the app simply continues with
/// defaults.
pub struct MigrationGate {
    store: Arc<dyn KeyValueStore>,
    state: MigrationState,
}

impl MigrationGate {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            state: MigrationState::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &MigrationState {
        &self.state
    }

    /// Run the migration scan unless it already ran for this storage origin.
    ///
    /// The sentinel is written unconditionally after the first scan, even
    /// when nothing was migrated or the scan failed, so later startups skip
    /// the scan entirely.
    pub async fn run_once(&mut self) -> &MigrationState {
        if self.state.has_run {
            return &self.state;
        }

        match self.store.get(MIGRATION_SENTINEL_KEY).await {
            Ok(Some(_)) => {
                self.state.has_run = true;
                return &self.state;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%err, "could not read migration sentinel");
                self.state.has_run = true;
                return &self.state;
            }
        }

        self.state.attempts += 1;
        match migrate_legacy(self.store.as_ref()).await {
            Ok(outcome) => {
                self.state.outcome = Some(outcome);
            }
            Err(err) => {
                tracing::warn!(%err, "legacy migration failed, continuing with defaults");
            }
        }

        if let Err(err) = self.store.set(MIGRATION_SENTINEL_KEY, SENTINEL_VALUE).await {
            tracing::warn!(%err, "could not write migration sentinel");
        }
        self.state.has_run = true;
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryStore;

    async fn seed(store: &InMemoryStore, entries: &[(&str, &str)]) {
        for (key, value) in entries {
            store.set(key, value).await.unwrap();
        }
    }

    #[tokio::test]
    async fn empty_store_has_nothing_to_migrate() {
        let store = InMemoryStore::new();
        let outcome = migrate_legacy(&store).await.unwrap();
        assert_eq!(outcome, MigrationOutcome::NothingToMigrate);
        assert!(store.get(STORAGE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn existing_document_is_never_overwritten() {
        let store = InMemoryStore::new();
        seed(&store, &[(STORAGE_KEY, "{\"custom\":true}"), ("stackPoints", "5")]).await;

        let outcome = migrate_legacy(&store).await.unwrap();
        assert_eq!(outcome, MigrationOutcome::AlreadyMigrated);

        // Neither the document nor the legacy key was touched.
        assert_eq!(
            store.get(STORAGE_KEY).await.unwrap().as_deref(),
            Some("{\"custom\":true}")
        );
        assert_eq!(store.get("stackPoints").await.unwrap().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn invalid_points_default_to_zero() {
        let store = InMemoryStore::new();
        seed(&store, &[("stackPoints", "not a number")]).await;

        let MigrationOutcome::Migrated(doc) = migrate_legacy(&store).await.unwrap() else {
            panic!("expected a migration");
        };
        assert_eq!(doc.topic("stack").unwrap().points, 0);
        assert!(store.get("stackPoints").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn linked_list_points_land_under_hyphenated_key() {
        let store = InMemoryStore::new();
        seed(&store, &[("linkedListPoints", "9")]).await;

        let MigrationOutcome::Migrated(doc) = migrate_legacy(&store).await.unwrap() else {
            panic!("expected a migration");
        };
        assert_eq!(doc.topic("linked-list").unwrap().points, 9);
    }

    #[tokio::test]
    async fn duplicate_concept_ids_are_preserved() {
        let store = InMemoryStore::new();
        seed(
            &store,
            &[("completedConcepts", r#"["array-0","array-0","array-1"]"#)],
        )
        .await;

        let MigrationOutcome::Migrated(doc) = migrate_legacy(&store).await.unwrap() else {
            panic!("expected a migration");
        };
        assert_eq!(
            doc.topic("array").unwrap().completed_concepts,
            vec!["array-0", "array-0", "array-1"]
        );
    }

    #[tokio::test]
    async fn invalid_view_mode_is_left_in_place() {
        let store = InMemoryStore::new();
        seed(&store, &[("viewMode", "compact"), ("darkMode", "false")]).await;

        let MigrationOutcome::Migrated(doc) = migrate_legacy(&store).await.unwrap() else {
            panic!("expected a migration");
        };
        assert_eq!(doc.preferences.view_mode, ViewMode::Grid);
        assert_eq!(doc.preferences.dark_mode, Some(false));
        assert_eq!(store.get("viewMode").await.unwrap().as_deref(), Some("compact"));
        assert!(store.get("darkMode").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gate_scans_at_most_once() {
        let store = InMemoryStore::new();
        store.set("stackPoints", "5").await.unwrap();

        let kv: Arc<dyn KeyValueStore> = Arc::new(store.clone());
        let mut gate = MigrationGate::new(kv);

        gate.run_once().await;
        gate.run_once().await;

        let state = gate.state();
        assert!(state.has_run);
        assert_eq!(state.attempts, 1);
        assert_eq!(
            store.get(MIGRATION_SENTINEL_KEY).await.unwrap().as_deref(),
            Some(SENTINEL_VALUE)
        );
    }

    #[tokio::test]
    async fn gate_respects_sentinel_from_a_previous_process() {
        let store = InMemoryStore::new();
        seed(
            &store,
            &[(MIGRATION_SENTINEL_KEY, SENTINEL_VALUE), ("stackPoints", "5")],
        )
        .await;

        let kv: Arc<dyn KeyValueStore> = Arc::new(store.clone());
        let mut gate = MigrationGate::new(kv);
        gate.run_once().await;

        assert_eq!(gate.state().attempts, 0);
        // Legacy data stays untouched once the sentinel is set.
        assert_eq!(store.get("stackPoints").await.unwrap().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn gate_writes_sentinel_even_with_nothing_to_migrate() {
        let store = InMemoryStore::new();
        let kv: Arc<dyn KeyValueStore> = Arc::new(store.clone());
        let mut gate = MigrationGate::new(kv);
        gate.run_once().await;

        assert_eq!(
            gate.state().outcome,
            Some(MigrationOutcome::NothingToMigrate)
        );
        assert_eq!(
            store.get(MIGRATION_SENTINEL_KEY).await.unwrap().as_deref(),
            Some(SENTINEL_VALUE)
        );
        assert!(store.get(STORAGE_KEY).await.unwrap().is_none());
    }
}
