use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single log line as delivered by a log source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
    pub topics: Vec<String>,
}

impl LogEntry {
    pub fn new(timestamp: impl Into<String>, message: impl Into<String>, topics: &[&str]) -> Self {
        LogEntry {
            timestamp: timestamp.into(),
            message: message.into(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// A log entry classified as a login failure
///
/// Records with the same `identity` describe the same historical event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub timestamp: String,
    pub message: String,
    pub topics: Vec<String>,
    pub identity: String,
}

impl FailureRecord {
    pub fn from_entry(entry: &LogEntry) -> Self {
        FailureRecord {
            timestamp: entry.timestamp.clone(),
            message: entry.message.clone(),
            topics: entry.topics.clone(),
            identity: Self::identity_of(&entry.timestamp, &entry.message),
        }
    }

    /// Composite key of a failure: `<time>|<message>`
    pub fn identity_of(timestamp: &str, message: &str) -> String {
        format!("{}|{}", timestamp, message)
    }
}

/// An IP that crossed the attempt threshold inside the window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BruteForceAlert {
    pub ip: String,
    pub attempts: Vec<NaiveDateTime>,
}

impl BruteForceAlert {
    pub fn span(&self) -> chrono::Duration {
        match (self.attempts.iter().min(), self.attempts.iter().max()) {
            (Some(first), Some(last)) => *last - *first,
            _ => chrono::Duration::zero(),
        }
    }
}
