//! Keyword-based login failure classification

use crate::models::{FailureRecord, LogEntry};

/// Flags log entries whose message mentions any failure keyword
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    keywords: Vec<String>,
}

impl FailureClassifier {
    /// Build a classifier from a keyword list
    ///
    /// Keywords are lower-cased here so `classify` only folds the message.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        FailureClassifier { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Substring match on the lower-cased message, not a word match:
    /// "invalidated" counts as "invalid".
    pub fn is_failure(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.keywords.iter().any(|k| message.contains(k.as_str()))
    }

    pub fn classify(&self, entry: &LogEntry) -> Option<FailureRecord> {
        if self.is_failure(&entry.message) {
            Some(FailureRecord::from_entry(entry))
        } else {
            None
        }
    }

    /// Classify a batch, preserving input order
    pub fn classify_all(&self, entries: &[LogEntry]) -> Vec<FailureRecord> {
        entries.iter().filter_map(|e| self.classify(e)).collect()
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_KEYWORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> LogEntry {
        LogEntry::new("10:00:00", message, &["system", "error"])
    }

    #[test]
    fn test_default_keywords() {
        let classifier = FailureClassifier::default();
        assert!(classifier.classify(&entry("login failure for user admin from 1.2.3.4")).is_some());
        assert!(classifier.classify(&entry("authentication FAILED")).is_some());
        assert!(classifier.classify(&entry("access Denied")).is_some());
        assert!(classifier.classify(&entry("Invalid user guest")).is_some());
        assert!(classifier.classify(&entry("user admin logged in from 1.2.3.4")).is_none());
    }

    #[test]
    fn test_substring_not_word_match() {
        let classifier = FailureClassifier::default();
        assert!(classifier.is_failure("session invalidated"));
        assert!(classifier.is_failure("nofailedyes"));
    }

    #[test]
    fn test_custom_keywords_are_case_folded() {
        let classifier = FailureClassifier::new(["Bad Password"]);
        assert_eq!(classifier.keywords(), ["bad password".to_string()]);
        assert!(classifier.is_failure("BAD PASSWORD for root"));
        assert!(!classifier.is_failure("login failure"));
    }

    #[test]
    fn test_every_matching_entry_appears_once_in_order() {
        let classifier = FailureClassifier::default();
        let entries = vec![
            entry("login failure for user a from 1.1.1.1"),
            entry("dhcp lease assigned"),
            entry("denied connection from 2.2.2.2"),
            entry("user b logged out"),
            entry("invalid user c"),
        ];

        let records = classifier.classify_all(&entries);
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "login failure for user a from 1.1.1.1",
                "denied connection from 2.2.2.2",
                "invalid user c",
            ]
        );
    }

    #[test]
    fn test_record_keeps_original_case_and_topics() {
        let classifier = FailureClassifier::default();
        let record = classifier.classify(&entry("Login FAILURE for admin")).unwrap();
        assert_eq!(record.message, "Login FAILURE for admin");
        assert_eq!(record.topics, vec!["system".to_string(), "error".to_string()]);
        assert_eq!(record.identity, "10:00:00|Login FAILURE for admin");
    }
}
