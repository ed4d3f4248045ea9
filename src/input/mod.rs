pub mod json_export;
pub mod routeros;

pub use json_export::JsonExportSource;
pub use routeros::RouterOsSession;

use crate::models::LogEntry;
use thiserror::Error;

/// Errors raised while fetching log entries
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("Login rejected: {0}")]
    Login(String),

    #[error("Router returned an error: {0}")]
    Trap(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid log export: {0}")]
    Export(#[from] serde_json::Error),
}

/// A pull-based supplier of router log entries
pub trait LogSource {
    /// Fetch the full log currently held by the source
    fn fetch_entries(&mut self) -> Result<Vec<LogEntry>, SourceError>;
}
