//! Persistence module for the failure ledger
//!
//! The ledger remembers every failure record ever seen so that each run
//! only acts on the delta. Records are appended, never rewritten or pruned.

pub mod csv_ledger;

pub use csv_ledger::CsvLedger;

use crate::models::FailureRecord;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger format error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Ledger {path} has no id or time/message columns (header: {found})")]
    Header { path: PathBuf, found: String },

    #[error("Could not replace ledger {path}: {source}")]
    Replace {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not write {path}: {source}")]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Trait for ledger backends
///
/// A store is loaded once per run; `diff` then answers from memory and
/// `append` writes through before updating the in-memory view.
pub trait LedgerStore {
    /// Number of records currently held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a record with this identity has been seen before
    fn contains(&self, identity: &str) -> bool;

    /// Candidates whose identity is not yet in the ledger, in input order
    ///
    /// Duplicates inside `candidates` are all kept; only history is
    /// consulted.
    fn diff(&self, candidates: &[FailureRecord]) -> Vec<FailureRecord> {
        candidates
            .iter()
            .filter(|record| !self.contains(&record.identity))
            .cloned()
            .collect()
    }

    /// Persist a batch after the existing records
    ///
    /// Either the whole batch lands or none of it does.
    fn append(&mut self, new_records: &[FailureRecord]) -> Result<(), PersistenceError>;
}
