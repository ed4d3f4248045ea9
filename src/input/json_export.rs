use super::{LogSource, SourceError};
use crate::models::LogEntry;
use serde::Deserialize;
use std::path::PathBuf;

/// Topics arrive either as RouterOS's comma string or as a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Topics {
    Joined(String),
    List(Vec<String>),
}

impl Topics {
    fn into_vec(self) -> Vec<String> {
        match self {
            Topics::Joined(s) => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            Topics::List(list) => list,
        }
    }
}

/// Missing keys and explicit nulls both read as empty
#[derive(Debug, Deserialize)]
struct ExportedEntry {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    topics: Option<Topics>,
}

/// Reads a JSON array of `{time, message, topics}` objects, as produced by
/// dumping `/log/print` to a file
pub struct JsonExportSource {
    file_path: PathBuf,
}

impl JsonExportSource {
    pub fn new(file_path: PathBuf) -> Self {
        JsonExportSource { file_path }
    }

    pub fn parse(contents: &str) -> Result<Vec<LogEntry>, SourceError> {
        let exported: Vec<ExportedEntry> = serde_json::from_str(contents)?;
        Ok(exported
            .into_iter()
            .map(|e| LogEntry {
                timestamp: e.time.unwrap_or_default(),
                message: e.message.unwrap_or_default(),
                topics: e.topics.map(Topics::into_vec).unwrap_or_default(),
            })
            .collect())
    }
}

impl LogSource for JsonExportSource {
    fn fetch_entries(&mut self) -> Result<Vec<LogEntry>, SourceError> {
        let contents = std::fs::read_to_string(&self.file_path)?;
        let entries = Self::parse(&contents)?;
        log::debug!("Read {} entries from {:?}", entries.len(), self.file_path);
        Ok(entries)
    }
}
