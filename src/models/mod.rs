pub mod event;

pub use event::{BruteForceAlert, FailureRecord, LogEntry};
