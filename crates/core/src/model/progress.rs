use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::preferences::Preferences;

/// Canonical storage key holding the serialized [`ProgressDocument`].
pub const STORAGE_KEY: &str = "microleet_user_progress";

/// Sentinel key marking that the one-time legacy migration has been attempted.
pub const MIGRATION_SENTINEL_KEY: &str = "migration_completed";

/// Value written under [`MIGRATION_SENTINEL_KEY`].
pub const SENTINEL_VALUE: &str = "true";

/// Current document schema version.
pub const PROGRESS_VERSION: u32 = 1;

/// Per-topic progress: accumulated points and the concepts completed so far.
///
/// `completed_concepts` holds identifiers of the form `"<topic>-<index>"` in
/// completion order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    pub points: u32,
    pub completed_concepts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
}

impl TopicProgress {
    /// A fresh record with zero points and nothing completed.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            points: 0,
            completed_concepts: Vec::new(),
            last_accessed: None,
        }
    }
}

impl Default for TopicProgress {
    fn default() -> Self {
        Self::empty()
    }
}

/// The single canonical persisted record of a user's learning progress and
/// preferences.
///
/// Serialized field names are camelCase so exports stay compatible with
/// backups produced by earlier releases.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDocument {
    pub version: u32,
    pub topics: BTreeMap<String, TopicProgress>,
    /// Problem identifier -> understanding rating (1-5 scale).
    pub problem_understanding: BTreeMap<String, u8>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

impl Default for ProgressDocument {
    fn default() -> Self {
        Self {
            version: PROGRESS_VERSION,
            topics: BTreeMap::new(),
            problem_understanding: BTreeMap::new(),
            preferences: Preferences::default(),
            last_sync: None,
        }
    }
}

/// Errors raised while decoding an imported backup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    #[error("backup is not valid JSON")]
    Parse(#[source] serde_json::Error),
    #[error("backup does not look like a progress document")]
    InvalidStructure,
}

impl ProgressDocument {
    /// Progress for a topic, if any has been recorded.
    #[must_use]
    pub fn topic(&self, topic: &str) -> Option<&TopicProgress> {
        self.topics.get(topic)
    }

    /// Mutable progress record for a topic, created empty on first access.
    pub fn topic_entry(&mut self, topic: &str) -> &mut TopicProgress {
        self.topics.entry(topic.to_owned()).or_default()
    }

    /// Serialize the document for persistence or backup download.
    ///
    /// Output is deterministic for a given document: struct fields appear in
    /// declaration order and map entries in key order.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Decode a backup produced by [`ProgressDocument::to_json`].
    ///
    /// Validation is intentionally minimal: the text must be a JSON object
    /// carrying `version`, `topics`, and `problemUnderstanding`. Unknown
    /// extra fields are tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError`] if the text is not JSON or does not resemble
    /// a progress document.
    pub fn from_json(text: &str) -> Result<Self, ImportError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(ImportError::Parse)?;

        let Some(object) = value.as_object() else {
            return Err(ImportError::InvalidStructure);
        };
        for field in ["version", "topics", "problemUnderstanding"] {
            if !object.contains_key(field) {
                return Err(ImportError::InvalidStructure);
            }
        }

        serde_json::from_value(value).map_err(|_| ImportError::InvalidStructure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ViewMode;
    use crate::time::fixed_now;

    fn sample() -> ProgressDocument {
        let mut doc = ProgressDocument::default();
        let stack = doc.topic_entry("stack");
        stack.points = 15;
        stack.completed_concepts.push("stack-0".into());
        stack.completed_concepts.push("stack-1".into());
        stack.last_accessed = Some(fixed_now());
        doc.problem_understanding.insert("two-sum".into(), 4);
        doc.preferences.dark_mode = Some(true);
        doc
    }

    #[test]
    fn default_document_matches_schema_version() {
        let doc = ProgressDocument::default();
        assert_eq!(doc.version, PROGRESS_VERSION);
        assert!(doc.topics.is_empty());
        assert!(doc.problem_understanding.is_empty());
        assert_eq!(doc.preferences.view_mode, ViewMode::Grid);
    }

    #[test]
    fn json_round_trip_is_deep_equal() {
        let doc = sample();
        let text = doc.to_json().unwrap();
        let restored = ProgressDocument::from_json(&text).unwrap();
        assert_eq!(restored, doc);
    }

    #[test]
    fn serialized_field_names_are_camel_case() {
        let text = sample().to_json().unwrap();
        assert!(text.contains("\"problemUnderstanding\""));
        assert!(text.contains("\"completedConcepts\""));
        assert!(text.contains("\"viewMode\""));
        assert!(!text.contains("\"completed_concepts\""));
    }

    #[test]
    fn to_json_is_deterministic() {
        let doc = sample();
        assert_eq!(doc.to_json().unwrap(), doc.to_json().unwrap());
    }

    #[test]
    fn from_json_rejects_non_object() {
        assert!(matches!(
            ProgressDocument::from_json("[1,2,3]"),
            Err(ImportError::InvalidStructure)
        ));
    }

    #[test]
    fn from_json_rejects_missing_fields() {
        let err = ProgressDocument::from_json(r#"{"version":1,"topics":{}}"#);
        assert!(matches!(err, Err(ImportError::InvalidStructure)));
    }

    #[test]
    fn from_json_rejects_malformed_text() {
        assert!(matches!(
            ProgressDocument::from_json("not json"),
            Err(ImportError::Parse(_))
        ));
    }

    #[test]
    fn from_json_tolerates_unknown_fields() {
        let text = r#"{
            "version": 1,
            "topics": {},
            "problemUnderstanding": {},
            "futureField": {"anything": true}
        }"#;
        let doc = ProgressDocument::from_json(text).unwrap();
        assert_eq!(doc, ProgressDocument::default());
    }

    #[test]
    fn topic_entry_creates_empty_record() {
        let mut doc = ProgressDocument::default();
        assert_eq!(doc.topic_entry("trie"), &TopicProgress::empty());
        assert!(doc.topic("trie").is_some());
    }
}
