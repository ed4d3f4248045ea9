//! Windowed brute force detection
//!
//! Groups one run's new failure records by source address and flags every
//! address with enough failures packed into a short enough span. Counters
//! live only for the duration of a `detect` call; the ledger is what carries
//! state between runs.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use super::ip_extractor::extract_ip;
use super::timestamp::parse_log_time;
use crate::config::DetectionConfig;
use crate::models::{BruteForceAlert, FailureRecord};

/// Failure timestamps seen from one address during a run
#[derive(Debug, Clone)]
struct AttemptGroup {
    ip: String,
    timestamps: Vec<NaiveDateTime>,
}

impl AttemptGroup {
    fn new(ip: &str) -> Self {
        AttemptGroup {
            ip: ip.to_string(),
            timestamps: Vec::new(),
        }
    }

    fn count(&self) -> usize {
        self.timestamps.len()
    }

    fn span(&self) -> Duration {
        match (self.timestamps.iter().min(), self.timestamps.iter().max()) {
            (Some(first), Some(last)) => *last - *first,
            _ => Duration::zero(),
        }
    }
}

/// Flags source addresses exceeding a failure threshold inside a window
#[derive(Debug, Clone)]
pub struct BruteForceDetector {
    /// Minimum attempts per address (default: 2)
    threshold: usize,
    /// Maximum span between first and last attempt (default: 5 minutes)
    window: Duration,
}

impl BruteForceDetector {
    /// Create a detector with default thresholds
    pub fn new() -> Self {
        BruteForceDetector {
            threshold: 2,
            window: Duration::minutes(5),
        }
    }

    /// Create with custom thresholds
    pub fn with_config(threshold: usize, window: Duration) -> Self {
        BruteForceDetector { threshold, window }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::with_config(config.threshold, config.window())
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check a run's new records for brute force sources
    ///
    /// Records whose timestamp cannot be parsed, or whose message carries no
    /// address, take no part in grouping. Alerts come out in the order each
    /// address was first seen. A span exactly equal to the window still
    /// counts.
    pub fn detect(&self, records: &[FailureRecord], reference: NaiveDate) -> Vec<BruteForceAlert> {
        let groups = self.group_attempts(records, reference);

        groups
            .into_iter()
            .filter(|group| group.count() >= self.threshold && group.span() <= self.window)
            .map(|group| {
                log::debug!(
                    "{} failures from {} within {}s",
                    group.count(),
                    group.ip,
                    group.span().num_seconds()
                );
                BruteForceAlert {
                    ip: group.ip,
                    attempts: group.timestamps,
                }
            })
            .collect()
    }

    fn group_attempts(&self, records: &[FailureRecord], reference: NaiveDate) -> Vec<AttemptGroup> {
        let mut groups: Vec<AttemptGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records {
            let timestamp = match parse_log_time(&record.timestamp, reference) {
                Ok(ts) => ts,
                Err(e) => {
                    log::debug!("Dropping record from detection: {}", e);
                    continue;
                }
            };

            let Some(ip) = extract_ip(&record.message) else {
                continue;
            };

            let slot = *index.entry(ip.to_string()).or_insert_with(|| {
                groups.push(AttemptGroup::new(ip));
                groups.len() - 1
            });
            groups[slot].timestamps.push(timestamp);
        }

        groups
    }
}

impl Default for BruteForceDetector {
    fn default() -> Self {
        Self::new()
    }
}
