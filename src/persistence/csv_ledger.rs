//! CSV implementation of the LedgerStore trait

use super::{LedgerStore, PersistenceError};
use crate::models::FailureRecord;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Column layout written to a fresh ledger
///
/// Later versions may add columns after these but never reorder or drop
/// them.
pub const LEDGER_COLUMNS: [&str; 4] = ["time", "message", "topics", "id"];

/// One ledger row, read by column name
#[derive(Debug, Deserialize)]
struct LedgerRow {
    #[serde(default)]
    time: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    topics: String,
    #[serde(default)]
    id: String,
}

impl LedgerRow {
    fn into_record(self) -> FailureRecord {
        let identity = if self.id.is_empty() {
            FailureRecord::identity_of(&self.time, &self.message)
        } else {
            self.id
        };
        FailureRecord {
            timestamp: self.time,
            message: self.message,
            topics: split_topics(&self.topics),
            identity,
        }
    }
}

fn split_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Append-only failure ledger kept in a CSV file
///
/// The whole file is loaded on open. Appends go through a temporary file in
/// the same directory that is renamed over the ledger, so a crash leaves
/// either the old file or the old file plus the complete new batch.
///
/// There is no file locking: two processes appending at once can both add
/// the same batch.
pub struct CsvLedger {
    path: PathBuf,
    headers: Vec<String>,
    /// Whether the file on disk already starts with a header row
    has_header: bool,
    records: Vec<FailureRecord>,
    identities: HashSet<String>,
}

impl CsvLedger {
    /// Load the ledger at `path`
    ///
    /// A missing file is an empty ledger, not an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let mut ledger = CsvLedger {
            path,
            headers: LEDGER_COLUMNS.iter().map(|c| c.to_string()).collect(),
            has_header: false,
            records: Vec::new(),
            identities: HashSet::new(),
        };

        let file = match File::open(&ledger.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No ledger at {:?}, starting empty", ledger.path);
                return Ok(ledger);
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let headers = reader.headers()?;
        if headers.is_empty() {
            // Blank lines only; treated like an empty file
            log::info!("Ledger {:?} has no header, starting empty", ledger.path);
            return Ok(ledger);
        }

        let has = |column: &str| headers.iter().any(|h| h == column);
        if !has("id") && !(has("time") && has("message")) {
            return Err(PersistenceError::Header {
                path: ledger.path.clone(),
                found: headers.iter().collect::<Vec<_>>().join(","),
            });
        }
        ledger.headers = headers.iter().map(String::from).collect();
        ledger.has_header = true;

        for row in reader.deserialize::<LedgerRow>() {
            let record = row?.into_record();
            ledger.identities.insert(record.identity.clone());
            ledger.records.push(record);
        }

        log::debug!("Loaded {} ledger record(s) from {:?}", ledger.records.len(), ledger.path);
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in file order
    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    fn field_for<'a>(&self, column: &str, record: &'a FailureRecord, topics: &'a str) -> &'a str {
        match column {
            "time" => record.timestamp.as_str(),
            "message" => record.message.as_str(),
            "topics" => topics,
            "id" => record.identity.as_str(),
            _ => "",
        }
    }

    /// Write the current file plus `new_records` to a temporary file beside
    /// the ledger
    ///
    /// Nothing is visible at the ledger path until the returned file is
    /// persisted over it; dropping it discards the batch.
    fn stage(&self, new_records: &[FailureRecord]) -> Result<NamedTempFile, PersistenceError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        // A headerless file holds nothing but blank lines and is rewritten
        let existing = if self.has_header {
            match std::fs::read(&self.path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            }
        } else {
            Vec::new()
        };

        let mut staged = NamedTempFile::new_in(&dir)?;
        match std::fs::metadata(&self.path) {
            Ok(meta) => staged.as_file().set_permissions(meta.permissions())?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        {
            let file = staged.as_file_mut();
            file.write_all(&existing)?;
            if existing.last().is_some_and(|b| *b != b'\n') {
                file.write_all(b"\n")?;
            }

            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(file);
            if existing.is_empty() {
                writer.write_record(&self.headers)?;
            }
            for record in new_records {
                let topics = record.topics.join(",");
                let row: Vec<&str> = self
                    .headers
                    .iter()
                    .map(|column| self.field_for(column, record, &topics))
                    .collect();
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }
        staged.as_file().sync_all()?;

        Ok(staged)
    }
}

impl LedgerStore for CsvLedger {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn contains(&self, identity: &str) -> bool {
        self.identities.contains(identity)
    }

    fn append(&mut self, new_records: &[FailureRecord]) -> Result<(), PersistenceError> {
        if new_records.is_empty() {
            return Ok(());
        }

        let staged = self.stage(new_records)?;
        staged
            .persist(&self.path)
            .map_err(|e| PersistenceError::Replace {
                path: self.path.clone(),
                source: e.error,
            })?;

        self.has_header = true;
        for record in new_records {
            self.identities.insert(record.identity.clone());
            self.records.push(record.clone());
        }

        log::debug!("Appended {} record(s) to {:?}", new_records.len(), self.path);
        Ok(())
    }
}
