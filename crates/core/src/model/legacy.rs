//! Schema of the pre-document storage entries.
//!
//! Earlier releases scattered progress across single-purpose keys. The
//! migration consumes exactly the keys enumerated here; adding or removing a
//! legacy key is an edit to this table, not a hunt for string literals.

/// Topic names the legacy per-topic points keys were derived from, in their
/// original camelCase spelling (`linkedList` -> `linkedListPoints`).
pub const LEGACY_TOPICS: [&str; 12] = [
    "array",
    "string",
    "dictionary",
    "tuple",
    "set",
    "linkedList",
    "stack",
    "queue",
    "heap",
    "tree",
    "trie",
    "graph",
];

/// Descriptor for one known legacy storage entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegacyKey {
    /// Decimal integer string, e.g. `stackPoints = "5"`.
    TopicPoints(&'static str),
    /// JSON array of `"<topic>-<index>"` identifier strings.
    CompletedConcepts,
    /// JSON object of problem id -> understanding rating.
    ProblemUnderstanding,
    /// `"true"` / `"false"`.
    DarkMode,
    /// `"grid"` / `"list"`.
    ViewMode,
}

impl LegacyKey {
    /// The storage key this descriptor reads from.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            LegacyKey::TopicPoints(topic) => format!("{topic}Points"),
            LegacyKey::CompletedConcepts => "completedConcepts".to_string(),
            LegacyKey::ProblemUnderstanding => "problemUnderstanding".to_string(),
            LegacyKey::DarkMode => "darkMode".to_string(),
            LegacyKey::ViewMode => "viewMode".to_string(),
        }
    }

    /// Every legacy key the migration scans, points keys first.
    pub fn all() -> impl Iterator<Item = LegacyKey> {
        LEGACY_TOPICS
            .into_iter()
            .map(LegacyKey::TopicPoints)
            .chain([
                LegacyKey::CompletedConcepts,
                LegacyKey::ProblemUnderstanding,
                LegacyKey::DarkMode,
                LegacyKey::ViewMode,
            ])
    }
}

/// Derive the canonical topic key from a legacy topic name: camelCase
/// boundaries become hyphens and the result is lowercased
/// (`linkedList` -> `linked-list`).
#[must_use]
pub fn topic_key(legacy_name: &str) -> String {
    let mut key = String::with_capacity(legacy_name.len() + 2);
    for ch in legacy_name.chars() {
        if ch.is_ascii_uppercase() {
            key.push('-');
            key.push(ch.to_ascii_lowercase());
        } else {
            key.push(ch);
        }
    }
    key
}

/// Topic portion of a concept identifier: the prefix before the first `-`.
///
/// Returns `None` for identifiers with no usable prefix (empty, or starting
/// with the separator).
#[must_use]
pub fn concept_topic(concept_id: &str) -> Option<&str> {
    let prefix = concept_id.split('-').next().unwrap_or("");
    if prefix.is_empty() { None } else { Some(prefix) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_key_hyphenates_camel_case() {
        assert_eq!(topic_key("linkedList"), "linked-list");
        assert_eq!(topic_key("stack"), "stack");
        assert_eq!(topic_key("array"), "array");
    }

    #[test]
    fn every_legacy_topic_has_a_points_key() {
        let keys: Vec<String> = LEGACY_TOPICS
            .into_iter()
            .map(|topic| LegacyKey::TopicPoints(topic).key())
            .collect();
        assert!(keys.contains(&"stackPoints".to_string()));
        assert!(keys.contains(&"linkedListPoints".to_string()));
        assert_eq!(keys.len(), LEGACY_TOPICS.len());
    }

    #[test]
    fn all_enumerates_every_descriptor() {
        let keys: Vec<String> = LegacyKey::all().map(|k| k.key()).collect();
        assert_eq!(keys.len(), LEGACY_TOPICS.len() + 4);
        assert!(keys.contains(&"completedConcepts".to_string()));
        assert!(keys.contains(&"problemUnderstanding".to_string()));
        assert!(keys.contains(&"darkMode".to_string()));
        assert!(keys.contains(&"viewMode".to_string()));
    }

    #[test]
    fn concept_topic_takes_prefix_before_first_separator() {
        assert_eq!(concept_topic("array-0"), Some("array"));
        assert_eq!(concept_topic("linked-list-3"), Some("linked"));
        assert_eq!(concept_topic("plain"), Some("plain"));
        assert_eq!(concept_topic("-3"), None);
        assert_eq!(concept_topic(""), None);
    }
}
