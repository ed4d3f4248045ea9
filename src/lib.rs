pub mod config;
pub mod detection;
pub mod input;
pub mod models;
pub mod output;
pub mod persistence;
pub mod pipeline;

// Re-export commonly used types
pub use config::Config;
pub use models::{BruteForceAlert, FailureRecord, LogEntry};
pub use detection::{BruteForceDetector, FailureClassifier};
pub use input::{JsonExportSource, LogSource, RouterOsSession, SourceError};
pub use output::{DisplaySink, ReportEmitter};
pub use persistence::{CsvLedger, LedgerStore, PersistenceError};
pub use pipeline::{Monitor, RunError, RunSummary};
