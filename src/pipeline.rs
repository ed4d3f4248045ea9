//! One pass of the monitor
//!
//! Fetch → classify → dedup → persist → report → detect → alert, strictly in
//! that order. Any fetch or persistence failure ends the pass; the ledger
//! keeps its last good state because appends are all-or-nothing.

use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{Config, ConfigError, DetectionConfig};
use crate::detection::{BruteForceDetector, FailureClassifier};
use crate::input::{LogSource, SourceError};
use crate::models::{BruteForceAlert, FailureRecord};
use crate::output::{DisplaySink, ReportEmitter};
use crate::persistence::{CsvLedger, LedgerStore, PersistenceError};

pub const EXIT_OK: i32 = 0;
pub const EXIT_CONNECTION: i32 = 1;
pub const EXIT_PERSISTENCE: i32 = 2;
pub const EXIT_CONFIG: i32 = 3;

/// Reasons a pass is abandoned
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connection(#[from] SourceError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The ledger already holds the batch when the artifacts fail
    #[error("Logged {appended} new record(s) but could not write artifacts: {source}")]
    Artifacts {
        appended: usize,
        source: PersistenceError,
    },
}

impl RunError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => EXIT_CONFIG,
            RunError::Connection(_) => EXIT_CONNECTION,
            RunError::Persistence(_) | RunError::Artifacts { .. } => EXIT_PERSISTENCE,
        }
    }
}

/// What a pass saw and produced
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Entries returned by the source
    pub fetched: usize,
    /// Entries classified as failures, old and new
    pub failures: usize,
    /// Failures not seen in any earlier pass
    pub new_records: Vec<FailureRecord>,
    pub report: Option<PathBuf>,
    pub alerts: Vec<BruteForceAlert>,
    pub alert_file: Option<PathBuf>,
}

/// The failed-login monitor, wired to a ledger and a report emitter
pub struct Monitor<L: LedgerStore> {
    classifier: FailureClassifier,
    detector: BruteForceDetector,
    ledger: L,
    emitter: ReportEmitter,
}

impl Monitor<CsvLedger> {
    /// Load the ledger named in `config` and build a monitor around it
    pub fn from_config(config: &Config, sink: Box<dyn DisplaySink>) -> Result<Self, RunError> {
        config.validate()?;
        let ledger = CsvLedger::open(&config.storage.ledger_path)?;
        log::info!(
            "Loaded {} ledger record(s) from {:?}",
            ledger.len(),
            config.storage.ledger_path
        );
        let emitter = ReportEmitter::new(config.storage.report_dir.clone(), sink);
        Ok(Self::new(&config.detection, ledger, emitter))
    }
}

impl<L: LedgerStore> Monitor<L> {
    pub fn new(detection: &DetectionConfig, ledger: L, emitter: ReportEmitter) -> Self {
        Monitor {
            classifier: FailureClassifier::new(&detection.keywords),
            detector: BruteForceDetector::from_config(detection),
            ledger,
            emitter,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn detector(&self) -> &BruteForceDetector {
        &self.detector
    }

    /// Run one pass stamped with the current local time
    pub fn run_once(&mut self, source: &mut dyn LogSource) -> Result<RunSummary, RunError> {
        self.run_once_at(source, Local::now().naive_local())
    }

    /// Run one pass; `now` names the artifacts and completes abbreviated
    /// log timestamps
    pub fn run_once_at(
        &mut self,
        source: &mut dyn LogSource,
        now: NaiveDateTime,
    ) -> Result<RunSummary, RunError> {
        let entries = source.fetch_entries()?;
        log::info!("Retrieved {} log entries", entries.len());

        let failures = self.classifier.classify_all(&entries);
        let new_records = self.ledger.diff(&failures);
        log::debug!(
            "{} failure(s) in log, {} not seen before",
            failures.len(),
            new_records.len()
        );

        let mut summary = RunSummary {
            fetched: entries.len(),
            failures: failures.len(),
            ..RunSummary::default()
        };

        if new_records.is_empty() {
            log::info!("No new failed logins found");
            return Ok(summary);
        }

        self.ledger.append(&new_records)?;
        log::info!("Logged {} new failed login(s)", new_records.len());

        let appended = new_records.len();
        let artifacts = |source: PersistenceError| RunError::Artifacts { appended, source };

        summary.report = Some(
            self.emitter
                .write_report(&new_records, now)
                .map_err(artifacts)?,
        );

        let alerts = self.detector.detect(&new_records, now.date());
        if !alerts.is_empty() {
            let ips: Vec<&str> = alerts.iter().map(|a| a.ip.as_str()).collect();
            log::warn!("Brute force detected from: {}", ips.join(", "));
            summary.alert_file = Some(
                self.emitter
                    .write_alert(&alerts, self.detector.threshold(), self.detector.window(), now)
                    .map_err(artifacts)?,
            );
        }

        summary.alerts = alerts;
        summary.new_records = new_records;
        Ok(summary)
    }
}
